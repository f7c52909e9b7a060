#![allow(dead_code)]

pub mod chunk_server;
