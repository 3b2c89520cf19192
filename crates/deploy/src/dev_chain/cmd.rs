//! Command builder for Anvil.

/// Builder for the arguments of the `anvil` entrypoint.
#[derive(Debug, Clone)]
pub struct AnvilCmdBuilder {
    host: String,
    port: u16,
    chain_id: u64,
    block_time: Option<u64>,
    accounts: u32,
}

impl AnvilCmdBuilder {
    pub fn new(chain_id: u64) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8545,
            chain_id,
            block_time: None,
            accounts: 10,
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Mine a block every `block_time` seconds. Without it every transaction is mined immediately.
    pub fn block_time(mut self, block_time: Option<u64>) -> Self {
        self.block_time = block_time;
        self
    }

    /// Number of funded dev accounts.
    pub fn accounts(mut self, accounts: u32) -> Self {
        self.accounts = accounts;
        self
    }

    pub fn build(self) -> Vec<String> {
        let mut cmd = vec![
            "--host".to_string(),
            self.host,
            "--port".to_string(),
            self.port.to_string(),
            "--chain-id".to_string(),
            self.chain_id.to_string(),
            "--accounts".to_string(),
            self.accounts.to_string(),
        ];

        if let Some(block_time) = self.block_time {
            cmd.push("--block-time".to_string());
            cmd.push(block_time.to_string());
        }

        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_automine_by_default() {
        let cmd = AnvilCmdBuilder::new(31337).build();

        assert_eq!(
            cmd,
            vec![
                "--host", "0.0.0.0", "--port", "8545", "--chain-id", "31337", "--accounts", "10"
            ]
        );
    }

    #[test]
    fn test_optional_flags() {
        let cmd = AnvilCmdBuilder::new(31337)
            .port(9545)
            .block_time(Some(2))
            .build();

        assert!(cmd.windows(2).any(|w| w == ["--port", "9545"]));
        assert!(cmd.windows(2).any(|w| w == ["--block-time", "2"]));
    }
}
