//! Element store
//!
//! Every function takes the pool (or a connection inside a transaction) and
//! returns `civic_common::Result`, whose error kinds already separate
//! `NotFound`, `Conflict`, `TransientStorage` and fatal database errors.

pub mod catalog;
pub mod elements;
pub mod monitor;
pub mod progress;
pub mod responses;

pub use catalog::{get_section, get_topics, SectionSource};
pub use elements::{
    create_element, delete_element, get_element, get_elements_by_section, update_element,
    DeletedElement,
};
pub use progress::{get_progress, reconcile_book, recompute_progress};
pub use responses::{
    completed_element_ids, get_latest_response, get_responses, save_response_and_update_progress,
    SavedResponse,
};
