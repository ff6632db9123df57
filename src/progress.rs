/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Progress reporting for long-running codec calls

/// A sink for codec progress notifications
///
/// The codec calls [`init`](Self::init) exactly once at the start of each
/// work phase with the half-open range of values that phase will report,
/// then [`notify`](Self::notify) once per row, strictly in order.
/// Compression runs two phases over the same sink (row-index build, then
/// stream build, reported as `0..height` and `height..2 * height`);
/// decompression runs one (`0..height`).
///
/// Notifications are issued on whatever thread the codec call runs on.
/// There is no cancellation channel here: a sink that loses interest can
/// simply ignore further calls. Implementations must not panic; a panic
/// unwinds through the codec (rolling back the output file on the way)
/// instead of being reported as an error.
pub trait ProgressNotifier {
    /// Announce a phase reporting values in `min..max`
    fn init(&mut self, min: usize, max: usize);

    /// Report the current work unit
    fn notify(&mut self, current: usize);
}
