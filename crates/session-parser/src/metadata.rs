//! Session metadata derivation from the first `user` line of a session-log
//! file (§4.2 step 2).

/// The external id and display title derived for a session, before any
/// database row exists for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMetadata {
    pub external_id: String,
    pub title: String,
}

/// Derive session metadata from a file stem, optional `cwd`, and whether the
/// file lives under a `subagents/` directory.
///
/// `external_id` is always the file stem. `title` is the last path component
/// of `cwd`, followed by an 8-char prefix of the stem; when `cwd` is absent
/// the title falls back to the stem alone. A `[subagent] ` prefix is added
/// when `is_subagent` is set.
pub fn derive_session_metadata(
    file_stem: &str,
    cwd: Option<&str>,
    is_subagent: bool,
) -> SessionMetadata {
    let stem_prefix: String = file_stem.chars().take(8).collect();

    let base = match cwd {
        Some(cwd) => {
            let last_component = cwd.split(['/', '\\']).rfind(|c| !c.is_empty());
            match last_component {
                Some(c) => format!("{c}/{stem_prefix}"),
                None => stem_prefix.clone(),
            }
        }
        None => stem_prefix,
    };

    let title = if is_subagent {
        format!("[subagent] {base}")
    } else {
        base
    };

    SessionMetadata {
        external_id: file_stem.to_string(),
        title,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_id_is_always_the_file_stem() {
        let meta = derive_session_metadata("sess-xyz", Some("/home/u/proj"), false);
        assert_eq!(meta.external_id, "sess-xyz");
    }

    #[test]
    fn title_combines_last_cwd_component_and_stem_prefix() {
        let meta = derive_session_metadata("sess-xyz-12345", Some("/home/me/proj"), false);
        assert_eq!(meta.title, "proj/sess-xyz");
    }

    #[test]
    fn title_falls_back_to_stem_prefix_when_cwd_absent() {
        let meta = derive_session_metadata("sess-xyz-12345", None, false);
        assert_eq!(meta.title, "sess-xyz");
    }

    #[test]
    fn title_handles_single_component_cwd() {
        let meta = derive_session_metadata("sess-xyz", Some("proj"), false);
        assert_eq!(meta.title, "proj/sess-xyz");
    }

    #[test]
    fn subagent_sessions_get_a_bracketed_prefix() {
        let meta = derive_session_metadata("sess-xyz", Some("/home/u/proj"), true);
        assert_eq!(meta.title, "[subagent] proj/sess-xyz");
    }

    #[test]
    fn short_stem_is_not_padded() {
        let meta = derive_session_metadata("ab", Some("/home/u/proj"), false);
        assert_eq!(meta.title, "proj/ab");
    }
}
