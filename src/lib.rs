pub mod photokepler_core;
