use anyhow::{Result, anyhow};
use regex::Regex;
use std::collections::HashSet;
use std::process::Command;

use crate::extractor::IPV4_PATTERN;

/// Control surface over the packet filter. Each operation is one external
/// command invocation with no internal retry; callers decide how a failure
/// is handled.
pub trait Firewall: Send + Sync {
    /// Insert a deny rule for the address at the head of the ruleset.
    fn deny(&self, ip: &str) -> Result<()>;
    /// Delete the deny rule for the address.
    fn allow(&self, ip: &str) -> Result<()>;
    /// Every address currently carrying a deny rule.
    fn list_denied(&self) -> Result<HashSet<String>>;
}

pub struct Ufw {
    ip_regex: Regex,
}

impl Ufw {
    pub fn new() -> Self {
        Self {
            ip_regex: Regex::new(IPV4_PATTERN).expect("Fatal: Regex invalid"),
        }
    }

    fn run(&self, args: &[&str]) -> Result<std::process::Output> {
        let output = Command::new("ufw")
            .args(args)
            .output()
            .map_err(|e| anyhow!("failed to execute ufw: {}", e))?;

        if !output.status.success() {
            return Err(anyhow!(
                "ufw {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr)
            ));
        }
        Ok(output)
    }

    fn denied_in(&self, status_output: &str) -> HashSet<String> {
        status_output
            .lines()
            .filter_map(|line| self.ip_regex.find(line))
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

impl Firewall for Ufw {
    fn deny(&self, ip: &str) -> Result<()> {
        self.run(&["insert", "1", "deny", "from", ip, "to", "any"])?;
        Ok(())
    }

    fn allow(&self, ip: &str) -> Result<()> {
        self.run(&["delete", "deny", "from", ip, "to", "any"])?;
        Ok(())
    }

    fn list_denied(&self) -> Result<HashSet<String>> {
        let output = self.run(&["status"])?;
        Ok(self.denied_in(&String::from_utf8_lossy(&output.stdout)))
    }
}
