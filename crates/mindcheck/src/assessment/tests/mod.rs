mod common;
mod progression;
mod sessions;
