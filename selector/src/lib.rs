//! Audit of the Prometheus metrics an account ingests through remote write:
//! which of them are referenced by a dashboard widget or an alert condition.

pub mod alerts;
pub mod audit;
mod classify;
pub mod config;
pub mod dashboards;
mod error;
mod executor;
pub mod metrics;
pub mod nrql;
pub mod pager;
pub mod sink;
#[cfg(test)]
mod testing;

pub use {
    audit::{run, AuditReport},
    classify::{classify, UsageMap},
    config::{AccountId, AuditConfig, DashboardScope, ExecutorConfig, Region},
    error::{AuditError, Phase, Result, TransportError},
    executor::{NerdGraphClient, QueryExecutor},
    sink::OutputFiles,
};
