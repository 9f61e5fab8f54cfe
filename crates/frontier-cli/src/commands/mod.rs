pub mod tangency;
