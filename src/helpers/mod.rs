pub mod date_helpers;
