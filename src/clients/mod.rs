//! HTTP implementations of the collaborator traits in `domain::services`.

pub mod arista;
pub mod cumulus;
pub mod http;
pub mod ironic;
pub mod netbox;
pub mod powerdns;
pub mod redfish;
