use std::io::Read;

use sha2::{Digest, Sha256};

use crate::error::Result;

const CHUNK_SIZE: usize = 8192;

/**
 * \brief 根据邮箱生成 Gravatar 头像地址（SHA-256，默认图 mp）。
 */
pub fn get_gravatar_url(email: &str) -> String {
    let address = email.trim().to_lowercase();
    format!(
        "https://www.gravatar.com/avatar/{}?d=mp",
        calculate_sha256_string(&address)
    )
}

/**
 * \brief 以 8 KiB 分块读取并计算 SHA-256，返回小写十六进制。
 */
pub fn calculate_sha256<R: Read>(mut reader: R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn calculate_sha256_string(s: &str) -> String {
    hex::encode(Sha256::digest(s.as_bytes()))
}
