use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

pub const DEFAULT_USERNAME_PATTERN: &str = r"email: \d+\.(\S+)";

const DEFAULT_USER_MESSAGE: &str = "\u{26a0}\u{fe0f} <b>Torrent activity detected</b> \u{26a0}\u{fe0f}

You may have forgotten to turn your torrent client off and are now downloading or seeding torrents over the VPN. Torrent traffic is not allowed here.

Your connection to this server will be blocked for {duration} minutes. Please shut the torrent client down completely.
After {duration} minutes the block is lifted, but if the torrent traffic continues you will be blocked again and receive this message once more.";

const ADMIN_BLOCK_TEMPLATE: &str = "\u{26d4}\u{fe0f} <b>#Blocked</b>
\u{2796}\u{2796}\u{2796}\u{2796}\u{2796}\u{2796}\u{2796}\u{2796}\u{2796}
<b>Username :</b> {username}
<b>IP :</b> {ip}
<b>Server :</b> {server}
\u{2796}\u{2796}\u{2796}\u{2796}\u{2796}\u{2796}\u{2796}\u{2796}\u{2796}
<b>User tag :</b> #{username}";

const ADMIN_UNBLOCK_TEMPLATE: &str = "\u{2611}\u{fe0f} <b>#Unblocked</b>
\u{2796}\u{2796}\u{2796}\u{2796}\u{2796}\u{2796}\u{2796}\u{2796}\u{2796}
<b>Username :</b> {username}
<b>IP :</b> {ip}
<b>Server :</b> {server}
\u{2796}\u{2796}\u{2796}\u{2796}\u{2796}\u{2796}\u{2796}\u{2796}\u{2796}
<b>User tag :</b> #{username}";

#[derive(Debug, Deserialize)]
struct RawConfig {
    log_file: String,
    torrent_tag: String,
    #[serde(default = "default_block_duration")]
    block_duration: u64,
    #[serde(default)]
    bot_token: String,
    #[serde(default)]
    admin_bot_token: String,
    #[serde(default)]
    admin_chat_id: String,
    #[serde(default)]
    tid_regex: String,
    #[serde(default)]
    username_regex: String,
    #[serde(default)]
    send_user_message: bool,
    #[serde(default)]
    send_admin_message: bool,
    #[serde(default)]
    user_message_template: String,
    #[serde(default = "default_block_mode")]
    block_mode: String,
}

fn default_block_duration() -> u64 {
    10
}
fn default_block_mode() -> String {
    "ufw".to_string()
}

/// Validated runtime configuration. Patterns are compiled once at load;
/// an invalid pattern is a startup failure, not something the engine sees.
#[derive(Debug)]
pub struct Config {
    pub log_file: String,
    pub torrent_tag: String,
    /// Ban length in minutes; also the resync interval.
    pub block_duration: u64,
    pub bot_token: String,
    pub admin_bot_token: String,
    pub admin_chat_id: String,
    pub tid_regex: Option<Regex>,
    pub username_regex: Regex,
    pub send_user_message: bool,
    pub send_admin_message: bool,
    pub user_message: String,
    pub block_mode: String,
    pub hostname: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path))?;
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> Result<Self> {
        let raw: RawConfig =
            serde_yaml::from_str(contents).context("failed to parse YAML config")?;

        let username_pattern = if raw.username_regex.is_empty() {
            DEFAULT_USERNAME_PATTERN
        } else {
            &raw.username_regex
        };
        let username_regex = Regex::new(username_pattern)
            .with_context(|| format!("invalid username pattern {:?}", username_pattern))?;

        let tid_regex = if raw.tid_regex.is_empty() {
            None
        } else {
            Some(
                Regex::new(&raw.tid_regex)
                    .with_context(|| format!("invalid tid pattern {:?}", raw.tid_regex))?,
            )
        };

        let template = if raw.user_message_template.is_empty() {
            DEFAULT_USER_MESSAGE
        } else {
            &raw.user_message_template
        };
        let user_message = template.replace("{duration}", &raw.block_duration.to_string());

        Ok(Self {
            log_file: raw.log_file,
            torrent_tag: raw.torrent_tag,
            block_duration: raw.block_duration,
            bot_token: raw.bot_token,
            admin_bot_token: raw.admin_bot_token,
            admin_chat_id: raw.admin_chat_id,
            tid_regex,
            username_regex,
            send_user_message: raw.send_user_message,
            send_admin_message: raw.send_admin_message,
            user_message,
            block_mode: raw.block_mode,
            hostname: system_hostname(),
        })
    }

    pub fn ban_duration(&self) -> Duration {
        Duration::from_secs(self.block_duration * 60)
    }

    pub fn admin_block_message(&self, username: &str, ip: &str) -> String {
        render(ADMIN_BLOCK_TEMPLATE, username, ip, &self.hostname)
    }

    pub fn admin_unblock_message(&self, username: &str, ip: &str) -> String {
        render(ADMIN_UNBLOCK_TEMPLATE, username, ip, &self.hostname)
    }
}

fn render(template: &str, username: &str, ip: &str, server: &str) -> String {
    template
        .replace("{username}", username)
        .replace("{ip}", ip)
        .replace("{server}", server)
}

fn system_hostname() -> String {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return "unknown".to_string();
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = Config::parse(
            "log_file: /var/log/access.log\ntorrent_tag: torrent\n",
        )
        .unwrap();
        assert_eq!(cfg.block_duration, 10);
        assert_eq!(cfg.block_mode, "ufw");
        assert!(cfg.tid_regex.is_none());
        assert!(cfg.username_regex.is_match("email: 17.alice"));
        assert!(!cfg.send_user_message);
    }

    #[test]
    fn default_user_message_embeds_duration_twice() {
        let cfg = Config::parse(
            "log_file: a.log\ntorrent_tag: torrent\nblock_duration: 45\n",
        )
        .unwrap();
        assert_eq!(cfg.user_message.matches("45 minutes").count(), 2);
        assert!(!cfg.user_message.contains("{duration}"));
    }

    #[test]
    fn invalid_username_pattern_is_a_load_error() {
        let err = Config::parse(
            "log_file: a.log\ntorrent_tag: torrent\nusername_regex: '('\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid username pattern"));
    }

    #[test]
    fn missing_log_file_is_a_load_error() {
        assert!(Config::parse("torrent_tag: torrent\n").is_err());
    }

    #[test]
    fn admin_templates_render_placeholders() {
        let mut cfg = Config::parse(
            "log_file: a.log\ntorrent_tag: torrent\n",
        )
        .unwrap();
        cfg.hostname = "vpn-01".to_string();
        let msg = cfg.admin_block_message("alice", "10.0.0.5");
        assert!(msg.contains("<b>Username :</b> alice"));
        assert!(msg.contains("<b>IP :</b> 10.0.0.5"));
        assert!(msg.contains("<b>Server :</b> vpn-01"));
        assert!(msg.contains("#alice"));
        assert!(cfg.admin_unblock_message("alice", "10.0.0.5").contains("#Unblocked"));
    }
}
