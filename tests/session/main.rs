mod common;

mod breakpoints;
mod bridge;
