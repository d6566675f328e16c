//! End-to-end suite for the module bus over the loopback backend.

#[cfg(test)]
mod support;

#[cfg(test)]
mod transfer_e2e;

#[cfg(test)]
mod control_plane;
