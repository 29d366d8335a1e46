pub mod hubspace;
