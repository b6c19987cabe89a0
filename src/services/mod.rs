//! Business logic services

pub mod circulation;
pub mod copies;
pub mod loans;
pub mod policy;
pub mod sweeper;

use std::sync::Arc;

use crate::{clock::Clock, directory::Directories, store::CirculationStore};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub copies: copies::CopyRegistry,
    pub loans: loans::LoanLedger,
    pub circulation: circulation::CirculationService,
}

impl Services {
    /// Wire all services over one store, one set of directories and one clock
    pub fn new(
        store: Arc<dyn CirculationStore>,
        directories: Directories,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let copies = copies::CopyRegistry::new(
            store.clone(),
            directories.catalog.clone(),
            directories.locations.clone(),
            clock.clone(),
        );
        let loans = loans::LoanLedger::new(store.clone(), clock.clone());
        let circulation = circulation::CirculationService::new(
            store,
            directories.users,
            directories.catalog,
            copies.clone(),
            loans.clone(),
            clock,
        );

        Self {
            copies,
            loans,
            circulation,
        }
    }
}
