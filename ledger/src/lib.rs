pub mod allocator;
pub mod archive;
pub mod broadcast;
pub mod cache;
pub mod classifier;
pub mod fetch;
pub mod funding;
pub mod notify;
pub mod queries;
pub mod reconcile;
pub mod store;
pub mod validator;

fn _version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
fn _pkg_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}

pub fn version() -> String {
    format!("{}: {}", _pkg_name(), _version())
}

#[test]
fn test_version() {
    println!("{}", version());
}
