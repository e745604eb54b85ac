//! Core library for the mileage-ledger command line application.
//!
//! The library records delivery trips in a reimbursement spreadsheet. Remote
//! collaborators live under [`mileage::ledger::geo`], the workbook image in
//! [`mileage::ledger::model`] with its readers and writers in
//! [`mileage::ledger::io`], the per-batch policy in
//! [`mileage::ledger::workflow`], and the long-lived state that ties them
//! together in [`mileage::ledger::session`].

pub mod mileage;

pub use mileage::ledger::{
    Result, ToolError, bootstrap, config, error, geo, io, model, postcode, session, workflow,
};
