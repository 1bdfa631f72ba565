//! Coordinated choropleth map and bar chart.
//!
//! Tabular attributes are joined onto region geometries, classified into a
//! five-class quantile color scale and drawn twice: as map regions and as a
//! sorted bar chart. A [`coordinator::Coordinator`] keeps both views on the
//! same expressed attribute and cross-highlights them on hover.

pub mod classify;
pub mod config;
pub mod coordinator;
pub mod data;
pub mod join;
pub mod projection;
pub mod render;
pub mod selection;
pub mod types;
pub mod ui;
pub mod view;
