pub mod acme_accounts;
pub mod certificates;
