//! Module configuration and its translation into command text.
//!
//! [`RadioConfig`] is a set of optional settings. Unset fields are left as
//! the module has them. [`RadioConfig::commands`] yields one command per set
//! field in a fixed order, which [`Radio::apply_config`](crate::radio::Radio::apply_config)
//! submits one at a time through the normal command path.

use rylr_core::types::{RfParameters, WorkMode};

use crate::commands;

/// Settings to apply to a module. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RadioConfig {
    /// Module address, 0-65535.
    pub address: Option<u16>,
    /// Network ID, 0-16. Modules must share it to talk.
    pub network_id: Option<u8>,
    /// Center frequency in hertz.
    pub band: Option<u32>,
    /// Spreading factor, bandwidth, coding rate, preamble.
    pub parameters: Option<RfParameters>,
    /// Work mode.
    pub mode: Option<WorkMode>,
    /// UART baud rate.
    pub uart_baud_rate: Option<u32>,
    /// AES-128 network password.
    pub encryption_key: Option<[u8; 16]>,
    /// RF output power in dBm, 0-15.
    pub rf_output_power: Option<u8>,
}

/// One configuration command and the setting it changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigCommand {
    /// Human-readable setting name, used in error messages.
    pub setting: &'static str,
    /// Command text without terminator.
    pub command: String,
}

impl ConfigCommand {
    fn new(setting: &'static str, command: String) -> Self {
        ConfigCommand { setting, command }
    }
}

impl RadioConfig {
    /// An empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address(mut self, address: u16) -> Self {
        self.address = Some(address);
        self
    }

    pub fn network_id(mut self, network_id: u8) -> Self {
        self.network_id = Some(network_id);
        self
    }

    pub fn band(mut self, freq_hz: u32) -> Self {
        self.band = Some(freq_hz);
        self
    }

    pub fn parameters(mut self, parameters: RfParameters) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn mode(mut self, mode: WorkMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn uart_baud_rate(mut self, baud: u32) -> Self {
        self.uart_baud_rate = Some(baud);
        self
    }

    pub fn encryption_key(mut self, key: [u8; 16]) -> Self {
        self.encryption_key = Some(key);
        self
    }

    pub fn rf_output_power(mut self, dbm: u8) -> Self {
        self.rf_output_power = Some(dbm);
        self
    }

    /// Whether no setting is set.
    pub fn is_empty(&self) -> bool {
        *self == RadioConfig::default()
    }

    /// The commands that apply this configuration, in the order they must
    /// be sent: address, network ID, band, RF parameters, mode, UART baud
    /// rate, password, output power.
    pub fn commands(&self) -> Vec<ConfigCommand> {
        let mut cmds = Vec::new();

        if let Some(address) = self.address {
            cmds.push(ConfigCommand::new("address", commands::cmd_set_address(address)));
        }
        if let Some(network_id) = self.network_id {
            cmds.push(ConfigCommand::new(
                "network ID",
                commands::cmd_set_network_id(network_id),
            ));
        }
        if let Some(band) = self.band {
            cmds.push(ConfigCommand::new("band", commands::cmd_set_band(band)));
        }
        if let Some(params) = &self.parameters {
            cmds.push(ConfigCommand::new(
                "RF parameters",
                commands::cmd_set_parameters(params),
            ));
        }
        if let Some(mode) = self.mode {
            cmds.push(ConfigCommand::new("mode", commands::cmd_set_mode(mode)));
        }
        if let Some(baud) = self.uart_baud_rate {
            cmds.push(ConfigCommand::new(
                "UART baud rate",
                commands::cmd_set_baud_rate(baud),
            ));
        }
        if let Some(key) = &self.encryption_key {
            cmds.push(ConfigCommand::new(
                "encryption key",
                commands::cmd_set_password(key),
            ));
        }
        if let Some(dbm) = self.rf_output_power {
            cmds.push(ConfigCommand::new(
                "RF output power",
                commands::cmd_set_rf_power(dbm),
            ));
        }

        cmds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rylr_core::types::{band, Bandwidth};

    #[test]
    fn empty_config_has_no_commands() {
        let config = RadioConfig::new();
        assert!(config.is_empty());
        assert!(config.commands().is_empty());
    }

    #[test]
    fn full_config_in_fixed_order() {
        let config = RadioConfig::new()
            .rf_output_power(14)
            .encryption_key([0xAB; 16])
            .uart_baud_rate(115_200)
            .mode(WorkMode::Transceiver)
            .parameters(RfParameters {
                spreading_factor: 9,
                bandwidth: Bandwidth::Khz125,
                coding_rate: 1,
                preamble: 12,
            })
            .band(band::USA)
            .network_id(18)
            .address(120);
        assert!(!config.is_empty());

        let texts: Vec<String> = config.commands().into_iter().map(|c| c.command).collect();
        assert_eq!(
            texts,
            vec![
                "AT+ADDRESS=120",
                "AT+NETWORKID=18",
                "AT+BAND=915000000",
                "AT+PARAMETER=9,7,1,12",
                "AT+MODE=0",
                "AT+IPR=115200",
                "AT+CPIN=abababababababababababababababab",
                "AT+CRFOP=14",
            ]
        );
    }

    #[test]
    fn unset_fields_are_skipped() {
        let config = RadioConfig::new().band(band::EUROPE_868).mode(WorkMode::Sleep);
        assert_eq!(
            config.commands(),
            vec![
                ConfigCommand {
                    setting: "band",
                    command: "AT+BAND=868000000".into(),
                },
                ConfigCommand {
                    setting: "mode",
                    command: "AT+MODE=1".into(),
                },
            ]
        );
    }
}
