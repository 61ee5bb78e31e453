//! High-level client API.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use rqap_protocol::{Command, DataFrame, Sexp};

/// High-level client for an Rserve-compatible server.
///
/// Thin wrappers over [`Connection::request`]: each method sends one
/// command and unwraps the reply into the shape callers want.
pub struct Client {
    conn: Connection,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            conn: Connection::new(config),
        }
    }

    /// Connects to the server.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        self.conn.connect().await
    }

    /// Returns whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Closes the connection.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.conn.close().await
    }

    /// Evaluates an R expression and returns the decoded result.
    pub async fn eval(&mut self, expr: impl Into<String>) -> Result<Sexp, ClientError> {
        self.conn.request(&Command::Eval(expr.into())).await
    }

    /// Evaluates an R expression, discarding any result.
    pub async fn eval_void(&mut self, expr: impl Into<String>) -> Result<(), ClientError> {
        self.conn.request(&Command::EvalVoid(expr.into())).await?;
        Ok(())
    }

    /// Binds a value to a variable in the server's global environment.
    pub async fn assign(
        &mut self,
        name: impl Into<String>,
        value: Sexp,
    ) -> Result<(), ClientError> {
        self.conn
            .request(&Command::SetVariable {
                name: name.into(),
                value,
            })
            .await?;
        Ok(())
    }

    /// Uploads a data frame under the given variable name.
    pub async fn assign_data_frame(
        &mut self,
        name: impl Into<String>,
        frame: DataFrame,
    ) -> Result<(), ClientError> {
        let value = frame.into_sexp().map_err(ClientError::Protocol)?;
        self.assign(name, value).await
    }
}
