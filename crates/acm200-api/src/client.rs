// ACM200 device client
//
// Public API over the transport and codec. Every operation holds the
// exclusive slot for its whole duration, so switch commands and status
// queries never share the wire.

use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::protocol::{self, RouteMap, StatusTarget};
use crate::transport::{DeviceAddress, TcpTransport, Transport, TransportConfig};

/// What the device said in response to a switch command.
///
/// The ACM200 gives no reliable acknowledgement, so `rejected` is
/// diagnostic only: a switch that reaches the device is a success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchReceipt {
    pub command: String,
    pub reply: String,
    pub rejected: bool,
}

/// Client for one matrix.
///
/// Holds at most one device operation in flight. Callers queue on the
/// slot in arrival order; [`shutdown()`](Self::shutdown) abandons the
/// current operation and fails every later one with [`Error::Cancelled`].
pub struct DeviceClient<T = TcpTransport> {
    address: DeviceAddress,
    transport: T,
    slot: Mutex<()>,
    cancel: CancellationToken,
}

impl DeviceClient<TcpTransport> {
    /// Create a client that talks TCP to `address`.
    pub fn new(address: DeviceAddress, config: TransportConfig) -> Self {
        let transport = TcpTransport::new(address.clone(), config);
        Self::with_transport(address, transport)
    }
}

impl<T: Transport> DeviceClient<T> {
    /// Create a client over a caller-supplied transport.
    pub fn with_transport(address: DeviceAddress, transport: T) -> Self {
        Self {
            address,
            transport,
            slot: Mutex::new(()),
            cancel: CancellationToken::new(),
        }
    }

    /// The device endpoint.
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Abandon the in-flight operation (its connection is dropped) and
    /// refuse all further ones.
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            debug!(address = %self.address, "device client shutting down");
        }
        self.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    // ── Exclusive slot ───────────────────────────────────────────────

    async fn acquire(&self) -> Result<MutexGuard<'_, ()>, Error> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            guard = self.slot.lock() => Ok(guard),
        }
    }

    /// Run one command. Only called while the slot is held.
    async fn send(&self, command: &str) -> Result<String, Error> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            reply = self.transport.execute(command) => reply,
        }
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Route `output` to `input`.
    pub async fn switch_route(&self, output: u16, input: u16) -> Result<SwitchReceipt, Error> {
        let command = protocol::format_switch(output, input)?;
        let _slot = self.acquire().await?;

        debug!(address = %self.address, output, input, %command, "switching route");
        let reply = self.send(&command).await?;

        let rejected = protocol::parse_error(&reply);
        if rejected {
            warn!(
                output,
                input,
                reply = %reply.trim(),
                "device reported an error for switch command"
            );
        }

        Ok(SwitchReceipt {
            command,
            reply,
            rejected,
        })
    }

    /// Ask for every route at once.
    ///
    /// Tries each bulk status spelling until one parses to at least one
    /// route. A device that answers none of them yields an empty map.
    pub async fn get_bulk_routes(&self) -> Result<RouteMap, Error> {
        let commands = protocol::format_status_query(StatusTarget::All)?;
        let _slot = self.acquire().await?;

        for command in &commands {
            let reply = self.send(command).await?;
            let routes = protocol::parse_routes(&reply);
            if !routes.is_empty() {
                debug!(%command, count = routes.len(), "bulk status parsed");
                return Ok(routes);
            }
            trace!(%command, "no routes in bulk reply");
        }

        debug!(address = %self.address, "no bulk status spelling produced routes");
        Ok(RouteMap::new())
    }

    /// Ask which input feeds `output`. `None` when no spelling yields it.
    pub async fn get_route(&self, output: u16) -> Result<Option<u16>, Error> {
        let commands = protocol::format_status_query(StatusTarget::Output(output))?;
        let _slot = self.acquire().await?;

        for command in &commands {
            let reply = self.send(command).await?;
            if let Some(input) = protocol::parse_route_for(&reply, output) {
                debug!(%command, output, input, "route parsed");
                return Ok(Some(input));
            }
            trace!(%command, output, "no route in reply");
        }

        Ok(None)
    }
}
