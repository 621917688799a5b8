/* This file is part of DarkFi (https://dark.fi)
 *
 * Copyright (C) 2020-2026 Dyne.org foundation
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::sync::Arc;

use futures::{Future, FutureExt};
use smol::Executor;

use crate::{Error, Result};

pub type StoppableTaskPtr = Arc<StoppableTask>;

/// A task that can be prematurely (and externally) stopped at any time.
///
/// ```rust
/// let task = StoppableTask::new();
/// task.clone().start(
///     my_method(),
///     |result| self_.handle_stop(result),
///     Error::MyStopError,
///     executor,
/// );
/// ```
pub struct StoppableTask {
    stop_send: smol::channel::Sender<()>,
    stop_recv: smol::channel::Receiver<()>,
}

impl StoppableTask {
    pub fn new() -> Arc<Self> {
        let (stop_send, stop_recv) = smol::channel::unbounded();
        Arc::new(Self { stop_send, stop_recv })
    }

    /// Stops the task. On completion, the stop handler is called with
    /// the configured stop value.
    pub async fn stop(&self) {
        // Ignore any errors from this send
        let _ = self.stop_send.send(()).await;
    }

    /// Starts the task, running `main` until it either finishes on its
    /// own or `stop()` is called, whichever comes first. The result is
    /// then passed to `stop_handler`.
    pub fn start<'a, MainFut, StopFut, StopFn>(
        self: Arc<Self>,
        main: MainFut,
        stop_handler: StopFn,
        stop_value: Error,
        executor: Arc<Executor<'a>>,
    ) where
        MainFut: Future<Output = Result<()>> + Send + 'a,
        StopFut: Future<Output = ()> + Send,
        StopFn: FnOnce(Result<()>) -> StopFut + Send + 'a,
    {
        executor
            .spawn(async move {
                let main = main.fuse();
                let stop = self.stop_recv.recv().fuse();
                futures::pin_mut!(main, stop);

                let result = futures::select! {
                    _ = stop => Err(stop_value),
                    result = main => result
                };

                stop_handler(result).await;
            })
            .detach();
    }
}
