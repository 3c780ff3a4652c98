// Reference data
pub mod depots;
pub mod materials;

// Stock table and movement ledger
pub mod movements;
pub mod stock;

// Read-only reporting
pub mod reports;
