pub mod inbound;
pub mod outbound;
pub mod tcp;
