pub mod api;
pub mod rest;
pub mod rpc;
