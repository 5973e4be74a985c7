// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fuzz target for payload decoding

#![no_main]

use libfuzzer_sys::fuzz_target;
use simlink::codec;
use simlink::schema::DataType;
use simlink::HostType;

const CASES: &[(DataType, HostType)] = &[
    (DataType::Int32, HostType::I32),
    (DataType::Int32, HostType::Bool),
    (DataType::Int64, HostType::I64),
    (DataType::Float32, HostType::F32),
    (DataType::Float64, HostType::F64),
    (DataType::Float64, HostType::F32),
    (DataType::FixedString(8), HostType::String),
    (DataType::FixedString(256), HostType::String),
    (DataType::LatLonAlt, HostType::LatLonAlt),
    (DataType::Xyz, HostType::Xyz),
];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let (data_type, host) = CASES[selector as usize % CASES.len()];
    let offset = rest.first().map_or(0, |b| *b as usize % 16);
    let _ = codec::decode(rest, offset, data_type, host);
});
