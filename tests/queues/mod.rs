mod adapters;
mod logging;
mod persistence;
