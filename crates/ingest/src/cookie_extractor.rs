//! Extracts the session cookie needed by the remote client conversation
//! fetch (§4.4) from a third-party desktop client's cookie database.
//!
//! The cookie database is copied to a temp path before reading (the live
//! browser/client holds locks on it), queried read-only via `rusqlite`, and
//! its value decrypted per-platform. Any failure along the way yields `None`
//! rather than propagating an error — a missing cookie is an expected,
//! recoverable state (the remote sync worker treats it as "auth absent").

use std::path::Path;

#[cfg(target_os = "macos")]
use std::time::Duration;

#[cfg(target_os = "macos")]
use aes::Aes128;
#[cfg(target_os = "macos")]
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
#[cfg(target_os = "macos")]
use pbkdf2::pbkdf2_hmac;
#[cfg(target_os = "macos")]
use sha1::Sha1;
#[cfg(target_os = "macos")]
use tracing::debug;

/// Cookie names tried in order; the first hit under a `%claude.ai` host wins.
const CANDIDATE_NAMES: &[&str] = &["sessionKey", "__Secure-next-auth.session-token", "intercom-session"];

#[cfg(target_os = "macos")]
const PBKDF2_SALT: &[u8] = b"saltysalt";
#[cfg(target_os = "macos")]
const PBKDF2_ITERATIONS: u32 = 1003;
#[cfg(target_os = "macos")]
const AES_KEY_LEN: usize = 16;

/// Copy `cookie_db_path`, query it for the first candidate cookie under a
/// `claude.ai` host, and return its decrypted value.
pub async fn get_claude_cookie(cookie_db_path: &Path) -> Option<String> {
    let temp_dir = tempfile::tempdir().ok()?;
    let temp_path = temp_dir.path().join("cookies.db");
    tokio::fs::copy(cookie_db_path, &temp_path).await.ok()?;

    let blob = {
        let temp_path = temp_path.clone();
        tokio::task::spawn_blocking(move || query_cookie_blob(&temp_path))
            .await
            .ok()?
    }?;

    decrypt(&blob).await
}

fn query_cookie_blob(db_path: &Path) -> Option<Vec<u8>> {
    let conn = rusqlite::Connection::open_with_flags(db_path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY).ok()?;
    for name in CANDIDATE_NAMES {
        let value: rusqlite::Result<Vec<u8>> = conn.query_row(
            "SELECT encrypted_value FROM cookies WHERE host_key LIKE '%claude.ai' AND name = ?1",
            [name],
            |row| row.get(0),
        );
        if let Ok(value) = value {
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

async fn decrypt(blob: &[u8]) -> Option<String> {
    if let Some(ciphertext) = blob.strip_prefix(b"v10").or_else(|| blob.strip_prefix(b"v11")) {
        return decrypt_chromium(ciphertext).await;
    }

    if blob.len() > 10 && !blob.contains(&0u8) {
        if let Ok(s) = std::str::from_utf8(blob) {
            return Some(s.to_string());
        }
    }

    None
}

#[cfg(target_os = "macos")]
async fn decrypt_chromium(ciphertext: &[u8]) -> Option<String> {
    let passphrase = macos_keychain_passphrase().await?;
    let key = derive_key(&passphrase);
    aes_cbc_pkcs7_decrypt(&key, ciphertext)
}

#[cfg(target_os = "windows")]
async fn decrypt_chromium(ciphertext: &[u8]) -> Option<String> {
    dpapi_decrypt(ciphertext)
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
async fn decrypt_chromium(_ciphertext: &[u8]) -> Option<String> {
    None
}

#[cfg(target_os = "macos")]
async fn macos_keychain_passphrase() -> Option<String> {
    if std::env::var("CI").is_ok() {
        return None;
    }

    let output = tokio::time::timeout(
        Duration::from_secs(5),
        tokio::process::Command::new("/usr/bin/security")
            .args(["find-generic-password", "-w", "-s", "Claude Safe Storage"])
            .output(),
    )
    .await
    .ok()?
    .ok()?;

    if !output.status.success() {
        debug!("security find-generic-password did not succeed");
        return None;
    }

    let passphrase = String::from_utf8(output.stdout).ok()?;
    let passphrase = passphrase.trim();
    if passphrase.is_empty() {
        None
    } else {
        Some(passphrase.to_string())
    }
}

#[cfg(target_os = "macos")]
fn derive_key(passphrase: &str) -> [u8; AES_KEY_LEN] {
    let mut key = [0u8; AES_KEY_LEN];
    pbkdf2_hmac::<Sha1>(passphrase.as_bytes(), PBKDF2_SALT, PBKDF2_ITERATIONS, &mut key);
    key
}

#[cfg(target_os = "macos")]
fn aes_cbc_pkcs7_decrypt(key: &[u8; AES_KEY_LEN], ciphertext: &[u8]) -> Option<String> {
    type Aes128CbcDec = cbc::Decryptor<Aes128>;

    let iv = [0u8; 16];
    let mut buf = ciphertext.to_vec();
    let decryptor = Aes128CbcDec::new(key.into(), &iv.into());
    let plaintext = decryptor
        .decrypt_padded_mut::<cbc::cipher::block_padding::Pkcs7>(&mut buf)
        .ok()?;
    String::from_utf8(plaintext.to_vec()).ok()
}

#[cfg(target_os = "windows")]
fn dpapi_decrypt(ciphertext: &[u8]) -> Option<String> {
    use windows_sys::Win32::Foundation::HLOCAL;
    use windows_sys::Win32::Security::Cryptography::{CryptUnprotectData, CRYPT_INTEGER_BLOB};

    unsafe {
        let mut input = CRYPT_INTEGER_BLOB {
            cbData: ciphertext.len() as u32,
            pbData: ciphertext.as_ptr() as *mut u8,
        };
        let mut output = CRYPT_INTEGER_BLOB { cbData: 0, pbData: std::ptr::null_mut() };

        let ok = CryptUnprotectData(
            &mut input,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            0,
            &mut output,
        );

        if ok == 0 {
            return None;
        }

        let bytes = std::slice::from_raw_parts(output.pbData, output.cbData as usize).to_vec();
        windows_sys::Win32::System::Memory::LocalFree(output.pbData as HLOCAL);
        String::from_utf8(bytes).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plaintext_fallback_returns_printable_utf8_without_nulls() {
        let blob = b"plaintext-cookie-value".to_vec();
        assert_eq!(decrypt(&blob).await, Some("plaintext-cookie-value".to_string()));
    }

    #[tokio::test]
    async fn short_plaintext_is_rejected() {
        let blob = b"short".to_vec();
        assert_eq!(decrypt(&blob).await, None);
    }

    #[tokio::test]
    async fn blob_with_nulls_is_not_treated_as_plaintext() {
        let mut blob = b"long-enough-value".to_vec();
        blob.push(0);
        assert_eq!(decrypt(&blob).await, None);
    }

    #[tokio::test]
    async fn missing_cookie_database_yields_none() {
        let found = get_claude_cookie(Path::new("/nonexistent/cookies.db")).await;
        assert!(found.is_none());
    }

    #[test]
    fn query_returns_none_when_table_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("cookies.db");
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        drop(conn);
        assert!(query_cookie_blob(&db_path).is_none());
    }

    #[test]
    fn query_finds_the_first_matching_candidate_name() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("cookies.db");
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute(
            "CREATE TABLE cookies (host_key TEXT, name TEXT, encrypted_value BLOB)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO cookies (host_key, name, encrypted_value) VALUES ('.claude.ai', 'sessionKey', ?1)",
            [b"v10cipherbytes".to_vec()],
        )
        .unwrap();
        drop(conn);

        let blob = query_cookie_blob(&db_path).unwrap();
        assert_eq!(blob, b"v10cipherbytes");
    }

    #[cfg(target_os = "macos")]
    #[tokio::test]
    async fn macos_keychain_lookup_short_circuits_under_ci() {
        std::env::set_var("CI", "true");
        assert!(macos_keychain_passphrase().await.is_none());
        std::env::remove_var("CI");
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn derive_key_is_deterministic_and_16_bytes() {
        let a = derive_key("passphrase");
        let b = derive_key("passphrase");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }
}
