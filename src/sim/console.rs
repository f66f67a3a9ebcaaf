//! Simulator console commands.
//!
//! Each line typed into the simulator becomes a [`SimCommand`]. Most map
//! directly onto a dispatcher [`Command`].

use crate::ap::ApMode;
use crate::config::{NetworkDescriptor, NetworkType, SecurityMode, STATION_NETWORK_ID};
use crate::event::{Command, ProvisioningRequest};
use crate::provisioning::RENDEZVOUS_MODE_WIFI_NETWORK;
use crate::station::StationMode;
use crate::tunnel::TunnelMode;
use std::str::FromStr;

/// Console help text.
pub const HELP_TEXT: &str = "\
Commands:
  station <mode>            Set station mode (disabled, enabled, application-controlled)
  ap <mode>                 Set AP mode (disabled, enabled, on-demand, on-demand-no-station-provision, application-controlled)
  tunnel <mode>             Set tunnel mode (disabled, enabled)
  scan                      Scan for networks
  add <ssid> <security> [password]
                            Provision the station network
  update <ssid> <security> [password]
                            Replace the provisioned network (password kept if omitted)
  remove                    Remove the provisioned network
  networks                  Show the provisioned network
  enable | disable          Enable or disable the provisioned network
  test                      Test internet connectivity
  forget                    Clear the station provision
  demand | stop-ap          Demand or stop the on-demand AP
  rendezvous <on|off>       Toggle WiFi rendezvous mode
  reconnect-interval <ms>   Set the station reconnect interval
  ap-idle <ms>              Set the on-demand AP idle timeout
  status                    Show connectivity status
  help                      Show this help
  quit                      Exit";

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCommand {
    /// Run on the dispatcher.
    Execute(Command),
    /// Show connectivity status.
    Status,
    /// Show help.
    Help,
    /// Exit the simulator.
    Quit,
    /// Unknown or invalid command, with a message for the user.
    Unknown(String),
}

fn parse_arg<T: FromStr>(args: &str, usage: &str) -> Result<T, String> {
    args.parse::<T>().map_err(|_| format!("Usage: {}", usage))
}

fn parse_network(args: &str, usage: &str) -> Result<NetworkDescriptor, String> {
    let mut parts = args.split_whitespace();
    let (Some(ssid), Some(security)) = (parts.next(), parts.next()) else {
        return Err(format!("Usage: {}", usage));
    };
    let security = SecurityMode::from_str(security).map_err(|e| e.to_string())?;
    let password = parts.next().unwrap_or("");
    Ok(NetworkDescriptor::unchecked(ssid, security, password))
}

fn provisioning(request: ProvisioningRequest) -> SimCommand {
    SimCommand::Execute(Command::Provisioning(request))
}

impl SimCommand {
    /// Parse a command from an input line.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return SimCommand::Unknown(String::new());
        }

        let mut parts = input.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("");
        let args = parts.next().unwrap_or("").trim();

        let parsed = match cmd.to_lowercase().as_str() {
            "station" => parse_arg::<StationMode>(args, "station <mode>")
                .map(|m| SimCommand::Execute(Command::SetStationMode(m))),
            "ap" => parse_arg::<ApMode>(args, "ap <mode>")
                .map(|m| SimCommand::Execute(Command::SetApMode(m))),
            "tunnel" => parse_arg::<TunnelMode>(args, "tunnel <mode>")
                .map(|m| SimCommand::Execute(Command::SetTunnelMode(m))),
            "scan" => Ok(provisioning(ProvisioningRequest::ScanNetworks(
                NetworkType::WiFi,
            ))),
            "add" => parse_network(args, "add <ssid> <security> [password]").map(|n| {
                provisioning(ProvisioningRequest::AddNetwork(NetworkType::WiFi, n))
            }),
            "update" => parse_network(args, "update <ssid> <security> [password]").map(|n| {
                provisioning(ProvisioningRequest::UpdateNetwork(STATION_NETWORK_ID, n))
            }),
            "remove" => Ok(provisioning(ProvisioningRequest::RemoveNetwork(
                STATION_NETWORK_ID,
            ))),
            "networks" => Ok(provisioning(ProvisioningRequest::GetNetworks {
                include_credentials: false,
            })),
            "enable" => Ok(provisioning(ProvisioningRequest::EnableNetwork(
                STATION_NETWORK_ID,
            ))),
            "disable" => Ok(provisioning(ProvisioningRequest::DisableNetwork(
                STATION_NETWORK_ID,
            ))),
            "test" => Ok(provisioning(ProvisioningRequest::TestConnectivity(
                STATION_NETWORK_ID,
            ))),
            "forget" => Ok(SimCommand::Execute(Command::ClearStationProvision)),
            "demand" => Ok(SimCommand::Execute(Command::DemandStartAp)),
            "stop-ap" => Ok(SimCommand::Execute(Command::StopOnDemandAp)),
            "rendezvous" => match args {
                "on" => Ok(provisioning(ProvisioningRequest::SetRendezvousMode(
                    RENDEZVOUS_MODE_WIFI_NETWORK,
                ))),
                "off" => Ok(provisioning(ProvisioningRequest::SetRendezvousMode(0))),
                _ => Err("Usage: rendezvous <on|off>".to_string()),
            },
            "reconnect-interval" => parse_arg::<u32>(args, "reconnect-interval <ms>")
                .map(|ms| SimCommand::Execute(Command::SetStationReconnectInterval(ms))),
            "ap-idle" => parse_arg::<u32>(args, "ap-idle <ms>")
                .map(|ms| SimCommand::Execute(Command::SetApIdleTimeout(ms))),
            "status" | "s" => Ok(SimCommand::Status),
            "help" | "h" | "?" => Ok(SimCommand::Help),
            "quit" | "exit" | "q" => Ok(SimCommand::Quit),
            _ => Err(format!(
                "Unknown command: {}. Type 'help' for commands.",
                cmd
            )),
        };
        parsed.unwrap_or_else(SimCommand::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Parse Tests ====================

    #[test]
    fn test_parse_modes() {
        assert_eq!(
            SimCommand::parse("station enabled"),
            SimCommand::Execute(Command::SetStationMode(StationMode::Enabled))
        );
        assert_eq!(
            SimCommand::parse("AP on-demand"),
            SimCommand::Execute(Command::SetApMode(ApMode::OnDemand))
        );
        assert!(matches!(
            SimCommand::parse("tunnel sideways"),
            SimCommand::Unknown(msg) if msg.starts_with("Usage")
        ));
    }

    #[test]
    fn test_parse_add_network() {
        match SimCommand::parse("add HomeNet wpa2 password123") {
            SimCommand::Execute(Command::Provisioning(ProvisioningRequest::AddNetwork(
                NetworkType::WiFi,
                network,
            ))) => {
                assert_eq!(network.ssid, "HomeNet");
                assert_eq!(network.security, SecurityMode::Wpa2Personal);
                assert_eq!(network.password(), "password123");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_update_without_password() {
        match SimCommand::parse("update HomeNet wpa2-personal") {
            SimCommand::Execute(Command::Provisioning(ProvisioningRequest::UpdateNetwork(
                STATION_NETWORK_ID,
                network,
            ))) => assert_eq!(network.password(), ""),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(SimCommand::parse("add HomeNet"), SimCommand::Unknown(_)));
        assert!(matches!(
            SimCommand::parse("add HomeNet wpa9"),
            SimCommand::Unknown(_)
        ));
        assert!(matches!(
            SimCommand::parse("reconnect-interval soon"),
            SimCommand::Unknown(_)
        ));
        assert_eq!(SimCommand::parse("   "), SimCommand::Unknown(String::new()));
    }

    #[test]
    fn test_parse_shortcuts() {
        assert_eq!(SimCommand::parse("?"), SimCommand::Help);
        assert_eq!(SimCommand::parse("q"), SimCommand::Quit);
        assert_eq!(SimCommand::parse("status"), SimCommand::Status);
        assert_eq!(
            SimCommand::parse("rendezvous on"),
            SimCommand::Execute(Command::Provisioning(
                ProvisioningRequest::SetRendezvousMode(RENDEZVOUS_MODE_WIFI_NETWORK)
            ))
        );
    }
}
