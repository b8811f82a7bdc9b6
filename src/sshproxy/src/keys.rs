//! 单元 SSH 密钥对管理
//!
//! 密钥对以 OpenSSH 格式存放在磁盘上：`<dir>/<name>` 为 PEM 私钥，
//! `<dir>/<name>.pub` 为单行公钥。install 事件在缺失时生成，
//! generate-ssh-key 动作强制重新生成。

use crate::error::{ProxyError, Result};
use russh_keys::key::KeyPair;
use russh_keys::PublicKeyBase64;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 默认密钥文件名（沿用原代理库的命名）
pub const DEFAULT_KEY_NAME: &str = "id_sshproxy";

/// 公钥行末尾的注释
const KEY_COMMENT: &str = "sshproxy";

/// 单元密钥对的磁盘存储
#[derive(Debug, Clone)]
pub struct KeyStore {
    dir: PathBuf,
    name: String,
}

impl KeyStore {
    /// 创建指向指定目录与文件名的密钥存储
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
        }
    }

    /// 默认密钥目录：`$HOME/.ssh`
    pub fn default_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".ssh"))
            .ok_or_else(|| ProxyError::Key("cannot determine home directory".to_string()))
    }

    /// 私钥路径
    pub fn private_key_path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    /// 公钥路径
    pub fn public_key_path(&self) -> PathBuf {
        self.dir.join(format!("{}.pub", self.name))
    }

    /// 密钥对是否已存在（公私钥文件齐全）
    pub fn has_key(&self) -> bool {
        self.private_key_path().is_file() && self.public_key_path().is_file()
    }

    /// 生成 ed25519 密钥对并落盘，返回公钥行
    ///
    /// `force` 为 false 时拒绝覆盖已有密钥
    pub fn generate(&self, force: bool) -> Result<String> {
        if self.has_key() && !force {
            return Err(ProxyError::Key(format!(
                "key already exists at {}",
                self.private_key_path().display()
            )));
        }

        fs::create_dir_all(&self.dir)?;
        set_permissions(&self.dir, 0o700)?;

        let key = KeyPair::generate_ed25519()
            .ok_or_else(|| ProxyError::Key("ed25519 key generation failed".to_string()))?;

        let mut pem = Vec::new();
        russh_keys::encode_pkcs8_pem(&key, &mut pem)
            .map_err(|e| ProxyError::Key(format!("failed to encode private key: {}", e)))?;

        let private_path = self.private_key_path();
        fs::write(&private_path, &pem)?;
        set_permissions(&private_path, 0o600)?;

        let public_line = format!("{} {} {}", key.name(), key.public_key_base64(), KEY_COMMENT);
        fs::write(self.public_key_path(), format!("{}\n", public_line))?;

        info!(path = %private_path.display(), "Unit SSH keypair generated");
        Ok(public_line)
    }

    /// 读取公钥行
    pub fn public_key(&self) -> Result<String> {
        let path = self.public_key_path();
        let line = fs::read_to_string(&path).map_err(|e| {
            ProxyError::Key(format!("cannot read public key {}: {}", path.display(), e))
        })?;
        Ok(line.trim_end().to_string())
    }

    /// 加载私钥用于认证
    pub fn load_private(&self, passphrase: Option<&str>) -> Result<KeyPair> {
        let path = self.private_key_path();
        debug!(path = %path.display(), "Loading unit private key");
        russh_keys::load_secret_key(&path, passphrase).map_err(|e| {
            ProxyError::Key(format!("cannot load private key {}: {}", path.display(), e))
        })
    }
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
