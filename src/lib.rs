// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Driver for SOLEM BLIP Bluetooth LE irrigation controllers.
//!
//! ```no_run
//! # async fn run<T: solem_blip::bluetooth::BleTransport>(transport: T) -> solem_blip::Result<()> {
//! use solem_blip::controller::{ControllerSettings, IrrigationController};
//!
//! let settings = ControllerSettings::new("C8:B9:61:06:69:96");
//! let mut controller = IrrigationController::new(transport, settings);
//! controller.connect().await?;
//! controller.start_watering(1, 300).await?;
//! controller.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod bluetooth;
pub mod config;
pub mod controller;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod state;

pub use error::{Error, Result};
