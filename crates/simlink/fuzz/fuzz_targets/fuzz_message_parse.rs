// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fuzz target for the native message parser
//!
//! Any byte sequence the simulator hands back must parse or fail cleanly.

#![no_main]

use libfuzzer_sys::fuzz_target;
use simlink::protocol::{Message, MessageHeader};

fuzz_target!(|data: &[u8]| {
    let _ = MessageHeader::decode(data);

    // A parsed value response must never claim bytes outside the buffer.
    if let Ok((_, Message::SimObjectData(body))) = Message::parse(data) {
        assert!(body.payload.len() <= data.len());
    }
});
