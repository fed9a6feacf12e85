#![cfg(loom)]

mod manager;
