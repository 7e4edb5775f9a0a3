//! Matricula Core - Enrollment domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Enrollment`, `EnrollmentHistoryEntry`, `ReconciliationEntry`
//! - **Use cases** - `EnrollmentStateManager`, `CreateEnrollmentUseCase`,
//!   `EnrollmentQueryUseCase`, `ReconcileUseCase`
//! - **Port definitions** - Traits for adapters: `IPersistenceGateway`, `INotificationService`
//! - **Configuration** - YAML settings shared by the store, audit and CLI crates
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no I/O.
//! Ports define trait interfaces that adapter crates implement.
//! Use cases orchestrate domain entities through port interfaces.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
