//! Core of an interactive longevity dashboard over the Gapminder country
//! metrics: a dataset store with read-through caches, derived option
//! catalogs, typed selection state, and a reactive recomputation graph that
//! refreshes exactly the charts a control change touches.

pub mod catalog;
pub mod config;
pub mod error;
pub mod filter;
pub mod graph;
pub mod models;
pub mod outputs;
pub mod render;
pub mod selection;
pub mod store;
