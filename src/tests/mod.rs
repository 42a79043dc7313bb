//! Integration-style tests exercising the library end to end.
