use serde::Serialize;
use strum_macros::Display;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Idle,
    Scanning,
    Connecting,
    ServicesDiscovering,
    Ready,
    Disconnecting,
}

impl ConnectionState {
    /// Returns whether a link to a peripheral exists or is being established.
    #[must_use]
    pub const fn is_linked(self) -> bool {
        matches!(self, Self::Connecting | Self::ServicesDiscovering | Self::Ready)
    }

    /// Returns whether moving to `next` is a legal transition.
    ///
    /// Link loss may arrive in any state, so `Disconnecting` is always reachable.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use ConnectionState::{Connecting, Disconnecting, Idle, Ready, Scanning, ServicesDiscovering};

        matches!(
            (self, next),
            (_, Disconnecting)
                | (Idle | Scanning | Disconnecting, Scanning | Connecting)
                | (Scanning | Disconnecting, Idle)
                | (Connecting, ServicesDiscovering | Scanning | Idle)
                | (ServicesDiscovering, Ready | Scanning | Idle)
        )
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use super::ConnectionState::{
        Connecting, Disconnecting, Idle, Ready, Scanning, ServicesDiscovering,
    };

    #[rstest]
    #[case::start_scan(Idle, Scanning)]
    #[case::select_device(Scanning, Connecting)]
    #[case::link_up(Connecting, ServicesDiscovering)]
    #[case::discovered(ServicesDiscovering, Ready)]
    #[case::link_loss(Ready, Disconnecting)]
    #[case::rescan(Disconnecting, Scanning)]
    #[case::requested_disconnect(Disconnecting, Idle)]
    #[case::reconnect_other(Disconnecting, Connecting)]
    #[case::connect_failed(Connecting, Scanning)]
    fn legal_transitions(#[case] from: ConnectionState, #[case] to: ConnectionState) {
        assert!(from.can_transition_to(to), "{from} -> {to} should be legal");
    }

    #[rstest]
    #[case::skip_discovery(Connecting, Ready)]
    #[case::ready_without_link(Scanning, Ready)]
    #[case::ready_back_to_scanning(Ready, Scanning)]
    #[case::idle_to_discovery(Idle, ServicesDiscovering)]
    fn illegal_transitions(#[case] from: ConnectionState, #[case] to: ConnectionState) {
        assert!(!from.can_transition_to(to), "{from} -> {to} should be illegal");
    }

    #[test]
    fn only_link_states_are_linked() {
        assert!(Connecting.is_linked());
        assert!(ServicesDiscovering.is_linked());
        assert!(Ready.is_linked());
        assert!(!Idle.is_linked());
        assert!(!Scanning.is_linked());
        assert!(!Disconnecting.is_linked());
    }
}
