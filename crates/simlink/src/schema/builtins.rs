// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Built-in aviation variables loaded into every registry.

use super::{DataType, FieldSchema};

const RW: bool = true;
const RO: bool = false;

// (name, default unit, data type, settable, description)
const BUILTINS: &[(&str, &str, DataType, bool, &str)] = &[
    // Position / attitude
    ("PLANE LATITUDE", "degrees", DataType::Float64, RW, "Latitude of the aircraft"),
    ("PLANE LONGITUDE", "degrees", DataType::Float64, RW, "Longitude of the aircraft"),
    ("PLANE ALTITUDE", "feet", DataType::Float64, RW, "Altitude above mean sea level"),
    ("PLANE ALT ABOVE GROUND", "feet", DataType::Float64, RO, "Altitude above ground"),
    ("PLANE HEADING DEGREES TRUE", "degrees", DataType::Float64, RW, "True heading"),
    ("PLANE HEADING DEGREES MAGNETIC", "degrees", DataType::Float64, RW, "Magnetic heading"),
    ("PLANE PITCH DEGREES", "degrees", DataType::Float64, RW, "Pitch angle"),
    ("PLANE BANK DEGREES", "degrees", DataType::Float64, RW, "Bank angle"),
    ("STRUCT LATLONALT", "latlonalt", DataType::LatLonAlt, RO, "Position as one structure"),
    ("STRUCT WORLDVELOCITY", "feet per second", DataType::Xyz, RO, "World velocity vector"),
    ("SIM ON GROUND", "bool", DataType::Int32, RO, "On-ground flag"),
    ("GROUND ALTITUDE", "feet", DataType::Float64, RO, "Ground elevation below the aircraft"),
    // Speeds
    ("AIRSPEED INDICATED", "knots", DataType::Float64, RO, "Indicated airspeed"),
    ("AIRSPEED TRUE", "knots", DataType::Float64, RO, "True airspeed"),
    ("GROUND VELOCITY", "knots", DataType::Float64, RO, "Ground speed"),
    ("VERTICAL SPEED", "feet per minute", DataType::Float64, RW, "Vertical speed"),
    ("AIRSPEED MACH", "mach", DataType::Float64, RO, "Mach number"),
    ("VELOCITY WORLD X", "feet per second", DataType::Float64, RW, "World velocity X"),
    ("VELOCITY WORLD Y", "feet per second", DataType::Float64, RW, "World velocity Y"),
    ("VELOCITY WORLD Z", "feet per second", DataType::Float64, RW, "World velocity Z"),
    // Identification
    ("TITLE", "", DataType::FixedString(256), RO, "Aircraft title"),
    ("ATC ID", "", DataType::FixedString(32), RW, "ATC identifier"),
    ("ATC AIRLINE", "", DataType::FixedString(64), RW, "Airline name"),
    ("ATC FLIGHT NUMBER", "", DataType::FixedString(8), RW, "Flight number"),
    ("ATC MODEL", "", DataType::FixedString(32), RO, "ATC model code"),
    ("ATC TYPE", "", DataType::FixedString(32), RO, "ATC type"),
    // Engines / fuel
    ("NUMBER OF ENGINES", "number", DataType::Int32, RO, "Engine count"),
    ("GENERAL ENG RPM", "rpm", DataType::Float64, RO, "Engine RPM (indexed)"),
    ("GENERAL ENG THROTTLE LEVER POSITION", "percent", DataType::Float64, RW, "Throttle (indexed)"),
    ("ENG COMBUSTION", "bool", DataType::Int32, RO, "Engine running (indexed)"),
    ("FUEL TOTAL QUANTITY", "gallons", DataType::Float64, RO, "Total usable fuel"),
    ("FUEL TOTAL CAPACITY", "gallons", DataType::Float64, RO, "Total fuel capacity"),
    // Controls / configuration
    ("FLAPS HANDLE INDEX", "number", DataType::Int32, RW, "Flaps handle detent"),
    ("GEAR HANDLE POSITION", "bool", DataType::Int32, RW, "Gear handle down"),
    ("BRAKE PARKING POSITION", "bool", DataType::Int32, RW, "Parking brake set"),
    ("SPOILERS HANDLE POSITION", "percent", DataType::Float64, RW, "Spoiler handle"),
    ("AUTOPILOT MASTER", "bool", DataType::Int32, RO, "Autopilot engaged"),
    ("AUTOPILOT ALTITUDE LOCK VAR", "feet", DataType::Float64, RO, "Selected altitude"),
    ("AUTOPILOT HEADING LOCK DIR", "degrees", DataType::Float64, RO, "Selected heading"),
    // Environment / time
    ("AMBIENT TEMPERATURE", "celsius", DataType::Float64, RO, "Outside air temperature"),
    ("AMBIENT WIND VELOCITY", "knots", DataType::Float64, RO, "Wind speed"),
    ("AMBIENT WIND DIRECTION", "degrees", DataType::Float64, RO, "Wind direction"),
    ("SEA LEVEL PRESSURE", "millibars", DataType::Float64, RO, "Sea level pressure"),
    ("ZULU TIME", "seconds", DataType::Float64, RO, "Seconds since midnight UTC"),
    ("ABSOLUTE TIME", "seconds", DataType::Float64, RO, "Seconds since year 0"),
    ("SIMULATION RATE", "number", DataType::Float64, RO, "Simulation rate multiplier"),
    ("TOTAL WEIGHT", "pounds", DataType::Float64, RO, "Gross weight"),
    ("TRANSPONDER CODE", "bco16", DataType::Int64, RO, "Squawk code (indexed)"),
];

pub(super) fn schemas() -> impl Iterator<Item = FieldSchema> {
    BUILTINS
        .iter()
        .map(|&(name, unit, data_type, settable, description)| {
            let schema = FieldSchema::new(name, unit, data_type).with_description(description);
            if settable {
                schema
            } else {
                schema.read_only()
            }
        })
}
