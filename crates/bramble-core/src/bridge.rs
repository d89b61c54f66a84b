//! Command bridge to the long-lived helper process.
//!
//! One [`BridgeSession`] wraps one helper process bound to one application
//! and device. Requests and responses travel as length-prefixed JSON frames
//! (see [`crate::protocol`]) over the helper's stdio. The session is owned
//! behind a `tokio::sync::Mutex` so no two requests are ever in flight at
//! once; the helper has no defined concurrent-request semantics.
//!
//! [`WrapperBridge`] sits above the session and owns its lifecycle:
//! [`setup`](WrapperBridge::setup) validates the application artifact,
//! provisions the runtime bundle, launches the helper, and confirms it is
//! responding, at most once per bridge instance. The helper process is
//! released on every exit path: explicitly via [`close`](WrapperBridge::close)
//! and implicitly when the session drops (the child is spawned with
//! kill-on-drop).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, debug_span, trace, Instrument};

use crate::bundle;
use crate::elements::{TreeWalk, UIElements};
use crate::error::{Error, Result};
use crate::protocol::{
    decode_response, encode_request, read_frame_length, ElementDescriptor, ProtocolError, Request,
    Response, TreeNode, MAX_FRAME_LEN,
};

/// Timeout for reading one response frame from the helper.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// A bidirectional async stream suitable for a bridge session.
///
/// The joined stdio pipes of a spawned helper satisfy these bounds, and so
/// do in-memory duplex streams, which is how tests stand in for the helper.
pub trait SessionStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> SessionStream for T {}

/// Errors raised by the bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The session is not open (never started, closed, or torn down after
    /// an I/O failure).
    #[error("bridge session is not open")]
    NotOpen,

    /// The helper process could not be spawned.
    #[error("failed to spawn helper process {}: {source}", .program.display())]
    Spawn {
        /// The executable that failed to start.
        program: PathBuf,
        /// The underlying spawn error.
        source: std::io::Error,
    },

    /// The helper reported an operational failure.
    #[error("helper process rejected the request: {0}")]
    Remote(String),

    /// The helper reported a stale element reference: the UI changed after
    /// the element was fetched. The element must be re-queried; the bridge
    /// never re-resolves silently.
    #[error("stale element reference, the UI changed since it was queried: {0}")]
    StaleElement(String),

    /// An I/O error on the session stream.
    #[error("bridge I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The response could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The helper did not answer within the read timeout.
    #[error("helper process did not respond within {0:?}")]
    ResponseTimeout(Duration),

    /// The helper answered with a response of the wrong shape.
    #[error("unexpected response to {0} request")]
    UnexpectedResponse(&'static str),

    /// A screenshot payload was not valid base64.
    #[error("screenshot payload was not valid base64: {0}")]
    Screenshot(#[from] base64::DecodeError),
}

// ---------------------------------------------------------------------------
// BridgeSession
// ---------------------------------------------------------------------------

/// One live connection to a helper process.
///
/// Created either by spawning the real helper ([`BridgeSession::spawn`]) or
/// from a pre-connected stream ([`BridgeSession::from_stream`], used by
/// tests). All operations are `&mut self`: callers serialize access through
/// the owning mutex.
pub struct BridgeSession {
    stream: Option<Box<dyn SessionStream>>,
    child: Option<Child>,
}

impl BridgeSession {
    /// Spawns the helper executable and connects to its stdio.
    ///
    /// The child is configured to be killed when the session drops, so a
    /// failure later in setup cannot leak the process.
    pub fn spawn(program: &Path, args: &[&str]) -> std::result::Result<Self, BridgeError> {
        debug!(program = %program.display(), ?args, "spawning helper process");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BridgeError::Spawn {
                program: program.to_path_buf(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or_else(|| BridgeError::Io(
            std::io::Error::other("helper stdin was not captured"),
        ))?;
        let stdout = child.stdout.take().ok_or_else(|| BridgeError::Io(
            std::io::Error::other("helper stdout was not captured"),
        ))?;

        Ok(Self {
            stream: Some(Box::new(tokio::io::join(stdout, stdin))),
            child: Some(child),
        })
    }

    /// Creates a session over a pre-connected stream.
    ///
    /// There is no child process to manage; [`shutdown`](Self::shutdown)
    /// only closes the stream.
    pub fn from_stream(stream: impl SessionStream + 'static) -> Self {
        Self {
            stream: Some(Box::new(stream)),
            child: None,
        }
    }

    /// Returns `true` while the session stream is open.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Closes the stream and terminates the helper process, if any.
    pub fn shutdown(&mut self) {
        self.stream.take();
        if let Some(mut child) = self.child.take() {
            // kill_on_drop covers the rest; start_kill just makes it prompt.
            let _ = child.start_kill();
        }
    }

    /// Sends one request and waits for the helper's response.
    ///
    /// A [`Response::Error`] is converted into [`BridgeError::Remote`] or,
    /// when flagged stale, [`BridgeError::StaleElement`], so callers handle
    /// every failure through the error type.
    pub async fn send(&mut self, request: &Request) -> std::result::Result<Response, BridgeError> {
        let name = request.name();
        let span = debug_span!("bridge_send", request = name);
        async {
            let frame = encode_request(request)?;
            self.write_frame(&frame).await?;

            let payload = self.read_frame().await?;
            let response = match decode_response(&payload) {
                Ok(response) => response,
                Err(protocol_err) => {
                    // The stream is desynchronized; nothing sensible can
                    // follow a frame that does not decode.
                    self.shutdown();
                    return Err(BridgeError::Protocol(protocol_err));
                }
            };

            match response {
                Response::Error { message, stale: true } => {
                    Err(BridgeError::StaleElement(message))
                }
                Response::Error { message, stale: false } => Err(BridgeError::Remote(message)),
                other => Ok(other),
            }
        }
        .instrument(span)
        .await
    }

    /// Liveness probe.
    pub async fn ping(&mut self) -> std::result::Result<(), BridgeError> {
        self.expect_ok(&Request::Ping, "ping").await
    }

    /// Instructs the helper to launch the application under test.
    pub async fn start_app(&mut self, package: &str) -> std::result::Result<(), BridgeError> {
        let request = Request::Start {
            package: package.to_string(),
        };
        self.expect_ok(&request, "start").await
    }

    /// Evaluates a selector, returning descriptors in document order.
    pub async fn query(
        &mut self,
        selector: &str,
    ) -> std::result::Result<Vec<ElementDescriptor>, BridgeError> {
        let request = Request::Query {
            selector: selector.to_string(),
        };
        match self.send(&request).await? {
            Response::Elements { elements } => Ok(elements),
            _ => Err(BridgeError::UnexpectedResponse("query")),
        }
    }

    /// Touches a previously resolved element.
    pub async fn touch(&mut self, reference: &str) -> std::result::Result<(), BridgeError> {
        let request = Request::Touch {
            reference: reference.to_string(),
        };
        self.expect_ok(&request, "touch").await
    }

    /// Replaces the text of a previously resolved element.
    pub async fn set_text(
        &mut self,
        reference: &str,
        value: &str,
    ) -> std::result::Result<(), BridgeError> {
        let request = Request::SetText {
            reference: reference.to_string(),
            value: value.to_string(),
        };
        self.expect_ok(&request, "set_text").await
    }

    /// Dumps the current UI tree.
    pub async fn dump_tree(&mut self) -> std::result::Result<Option<TreeNode>, BridgeError> {
        match self.send(&Request::DumpTree).await? {
            Response::Tree { root } => Ok(root),
            _ => Err(BridgeError::UnexpectedResponse("dump_tree")),
        }
    }

    /// Captures the device screen as PNG bytes.
    pub async fn screenshot(&mut self) -> std::result::Result<Vec<u8>, BridgeError> {
        match self.send(&Request::Screenshot).await? {
            Response::Screenshot { data } => {
                use base64::Engine;
                Ok(base64::engine::general_purpose::STANDARD.decode(data)?)
            }
            _ => Err(BridgeError::UnexpectedResponse("screenshot")),
        }
    }

    /// Reads a shared-preferences file of the application under test.
    pub async fn read_preferences(
        &mut self,
        file_name: &str,
    ) -> std::result::Result<HashMap<String, String>, BridgeError> {
        let request = Request::ReadPreferences {
            file_name: file_name.to_string(),
        };
        match self.send(&request).await? {
            Response::Preferences { values } => Ok(values),
            _ => Err(BridgeError::UnexpectedResponse("read_preferences")),
        }
    }

    async fn expect_ok(
        &mut self,
        request: &Request,
        name: &'static str,
    ) -> std::result::Result<(), BridgeError> {
        match self.send(request).await? {
            Response::Ok => Ok(()),
            _ => Err(BridgeError::UnexpectedResponse(name)),
        }
    }

    // -----------------------------------------------------------------------
    // Frame I/O
    // -----------------------------------------------------------------------

    async fn write_frame(&mut self, frame: &[u8]) -> std::result::Result<(), BridgeError> {
        let stream = self.stream.as_mut().ok_or(BridgeError::NotOpen)?;
        trace!(frame_bytes = frame.len(), "writing frame");
        let result = async {
            stream.write_all(frame).await?;
            stream.flush().await
        }
        .await;

        if let Err(io_err) = result {
            // A broken pipe means the helper is gone; tear down so later
            // requests fail fast instead of writing into the void.
            self.shutdown();
            return Err(BridgeError::Io(io_err));
        }
        Ok(())
    }

    /// Reads one response frame, applying [`READ_TIMEOUT`] to the whole read.
    ///
    /// On I/O error or timeout the stream is dropped: the helper may still
    /// write a late response, and leaving those bytes buffered would hand a
    /// mismatched response to the next request.
    async fn read_frame(&mut self) -> std::result::Result<Vec<u8>, BridgeError> {
        let stream = self.stream.as_mut().ok_or(BridgeError::NotOpen)?;

        let result = timeout(READ_TIMEOUT, async {
            let mut header = [0u8; 4];
            stream.read_exact(&mut header).await?;
            let len = read_frame_length(&header);
            if len > MAX_FRAME_LEN {
                return Ok(Err(ProtocolError::Oversize(len)));
            }

            let mut payload = vec![0u8; len as usize];
            trace!(payload_bytes = len, "reading frame");
            stream.read_exact(&mut payload).await?;
            Ok::<_, std::io::Error>(Ok(payload))
        })
        .await;

        match result {
            Ok(Ok(Ok(payload))) => Ok(payload),
            Ok(Ok(Err(protocol_err))) => {
                self.shutdown();
                Err(BridgeError::Protocol(protocol_err))
            }
            Ok(Err(io_err)) => {
                self.shutdown();
                Err(BridgeError::Io(io_err))
            }
            Err(_) => {
                self.shutdown();
                Err(BridgeError::ResponseTimeout(READ_TIMEOUT))
            }
        }
    }
}

impl std::fmt::Debug for BridgeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeSession")
            .field("open", &self.is_open())
            .field("child", &self.child.as_ref().map(|c| c.id()))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Helper launching
// ---------------------------------------------------------------------------

/// Everything a launcher needs to start the helper for one session.
#[derive(Debug, Clone)]
pub struct LaunchContext {
    /// Directory of the provisioned runtime bundle.
    pub runtime_dir: PathBuf,
    /// The application artifact under test.
    pub apk: PathBuf,
    /// Package name of the application under test.
    pub package: String,
    /// Serial of the resolved target device.
    pub serial: String,
}

/// Strategy for starting the helper process.
///
/// The default [`ProcessLauncher`] spawns the bundled executable; tests
/// inject a launcher that returns a session over an in-memory stream.
#[async_trait]
pub trait HelperLauncher: Send + Sync {
    /// Starts the helper for the given session context.
    async fn launch(&self, context: &LaunchContext)
        -> std::result::Result<BridgeSession, BridgeError>;
}

/// Launches the helper executable from the provisioned runtime bundle.
pub struct ProcessLauncher;

#[async_trait]
impl HelperLauncher for ProcessLauncher {
    async fn launch(
        &self,
        context: &LaunchContext,
    ) -> std::result::Result<BridgeSession, BridgeError> {
        let program = bundle::server_binary(&context.runtime_dir);
        let apk = context.apk.to_string_lossy();
        BridgeSession::spawn(
            &program,
            &[
                "--serial",
                &context.serial,
                "--apk",
                apk.as_ref(),
                "--package",
                &context.package,
            ],
        )
    }
}

// ---------------------------------------------------------------------------
// WrapperBridge
// ---------------------------------------------------------------------------

/// Owns the helper-process session for one application.
///
/// Construct with [`WrapperBridge::new`], call [`setup`](Self::setup) once,
/// then issue typed operations. The session handle is shared with the
/// elements a query returns so that element-level actions go through the
/// same serialized session.
pub struct WrapperBridge {
    apk: PathBuf,
    package: String,
    serial: String,
    launcher: Arc<dyn HelperLauncher>,
    session: Option<Arc<Mutex<BridgeSession>>>,
}

impl WrapperBridge {
    /// Creates a bridge that will launch the bundled helper executable.
    pub fn new(
        apk: impl Into<PathBuf>,
        package: impl Into<String>,
        serial: impl Into<String>,
    ) -> Self {
        Self::with_launcher(apk, package, serial, Arc::new(ProcessLauncher))
    }

    /// Creates a bridge with an explicit helper-launching strategy.
    pub fn with_launcher(
        apk: impl Into<PathBuf>,
        package: impl Into<String>,
        serial: impl Into<String>,
        launcher: Arc<dyn HelperLauncher>,
    ) -> Self {
        Self {
            apk: apk.into(),
            package: package.into(),
            serial: serial.into(),
            launcher,
            session: None,
        }
    }

    /// Validates inputs, provisions the runtime bundle, and starts the
    /// helper session.
    ///
    /// Expensive, and guarded to run at most once per bridge instance: a
    /// second call on an already-set-up bridge returns immediately. If the
    /// helper fails its readiness probe the freshly spawned process is torn
    /// down before the error is returned.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidApk`] when the artifact is missing or not an `.apk`
    /// - [`Error::Provision`] when the runtime bundle cannot be extracted
    /// - [`Error::Bridge`] when the helper cannot be launched or does not
    ///   respond
    pub async fn setup(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }

        crate::lifecycle::validate_artifact(&self.apk)?;
        let runtime_dir = bundle::ensure(env!("CARGO_PKG_VERSION"))?;

        let context = LaunchContext {
            runtime_dir,
            apk: self.apk.clone(),
            package: self.package.clone(),
            serial: self.serial.clone(),
        };

        // If ping or start fail, dropping the session kills the helper.
        let mut session = self.launcher.launch(&context).await?;
        session.ping().await.map_err(Error::Bridge)?;
        session.start_app(&self.package).await.map_err(Error::Bridge)?;

        debug!(package = %self.package, serial = %self.serial, "bridge session started");
        self.session = Some(Arc::new(Mutex::new(session)));
        Ok(())
    }

    /// Returns `true` once [`setup`](Self::setup) has completed.
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// The serial this bridge is bound to.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// The package this bridge is bound to.
    pub fn package(&self) -> &str {
        &self.package
    }

    fn session(&self) -> Result<&Arc<Mutex<BridgeSession>>> {
        self.session
            .as_ref()
            .ok_or(Error::Bridge(BridgeError::NotOpen))
    }

    /// Evaluates a selector and snapshots the matched elements.
    pub async fn query(&self, selector: &str) -> Result<UIElements> {
        let handle = self.session()?;
        let descriptors = handle.lock().await.query(selector).await?;
        Ok(UIElements::new(selector, descriptors, handle.clone()))
    }

    /// Dumps the UI tree and returns a pre-order walk over it.
    pub async fn inspect(&self) -> Result<TreeWalk> {
        let handle = self.session()?;
        let root = handle.lock().await.dump_tree().await?;
        Ok(TreeWalk::new(root, handle.clone()))
    }

    /// Touches a previously resolved element reference.
    pub async fn touch(&self, reference: &str) -> Result<()> {
        Ok(self.session()?.lock().await.touch(reference).await?)
    }

    /// Sets the text of a previously resolved element reference.
    pub async fn set_text(&self, reference: &str, value: &str) -> Result<()> {
        Ok(self.session()?.lock().await.set_text(reference, value).await?)
    }

    /// Captures the device screen as PNG bytes.
    pub async fn take_screenshot(&self) -> Result<Vec<u8>> {
        Ok(self.session()?.lock().await.screenshot().await?)
    }

    /// Reads a shared-preferences file of the application under test.
    pub async fn read_preferences(&self, file_name: &str) -> Result<HashMap<String, String>> {
        Ok(self.session()?.lock().await.read_preferences(file_name).await?)
    }

    /// Shuts the session down and terminates the helper.
    ///
    /// Elements still holding the session see [`BridgeError::NotOpen`] from
    /// then on.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(handle) = self.session.take() {
            handle.lock().await.shutdown();
        }
        Ok(())
    }
}

impl std::fmt::Debug for WrapperBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrapperBridge")
            .field("apk", &self.apk)
            .field("package", &self.package)
            .field("serial", &self.serial)
            .field("open", &self.is_open())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{decode_request, encode_response};

    /// Starts a mock helper that answers each incoming request with the next
    /// scripted response, then returns a session connected to it.
    fn scripted_session(responses: Vec<Response>) -> BridgeSession {
        let (client, mut server) = tokio::io::duplex(256 * 1024);

        tokio::spawn(async move {
            for response in responses {
                let mut header = [0u8; 4];
                if server.read_exact(&mut header).await.is_err() {
                    return;
                }
                let len = read_frame_length(&header) as usize;
                let mut payload = vec![0u8; len];
                if server.read_exact(&mut payload).await.is_err() {
                    return;
                }
                decode_request(&payload).expect("mock received malformed request");

                let frame = encode_response(&response).expect("mock response encodes");
                if server.write_all(&frame).await.is_err() {
                    return;
                }
                let _ = server.flush().await;
            }
            // Dropping the server end closes the stream.
        });

        BridgeSession::from_stream(client)
    }

    #[test]
    fn from_stream_is_open() {
        let (client, _server) = tokio::io::duplex(1024);
        let session = BridgeSession::from_stream(client);
        assert!(session.is_open());
    }

    #[tokio::test]
    async fn send_without_stream_is_not_open() {
        let (client, _server) = tokio::io::duplex(1024);
        let mut session = BridgeSession::from_stream(client);
        session.shutdown();

        let result = session.send(&Request::Ping).await;
        assert!(matches!(result, Err(BridgeError::NotOpen)));
    }

    #[tokio::test]
    async fn ping_round_trip() {
        let mut session = scripted_session(vec![Response::Ok]);
        session.ping().await.unwrap();
    }

    #[tokio::test]
    async fn remote_error_is_mapped() {
        let mut session = scripted_session(vec![Response::Error {
            message: "no view with reference ref-9".to_string(),
            stale: false,
        }]);

        let err = session.touch("ref-9").await.unwrap_err();
        match err {
            BridgeError::Remote(message) => {
                assert_eq!(message, "no view with reference ref-9");
            }
            other => panic!("expected Remote, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stale_error_is_distinguished() {
        let mut session = scripted_session(vec![Response::Error {
            message: "view is detached from window".to_string(),
            stale: true,
        }]);

        let err = session.touch("ref-1").await.unwrap_err();
        assert!(matches!(err, BridgeError::StaleElement(_)));
        assert!(err.to_string().contains("stale element reference"));
    }

    #[tokio::test]
    async fn query_preserves_document_order() {
        let elements = vec![
            ElementDescriptor {
                reference: "ref-2".to_string(),
                element_class: "android.widget.Button".to_string(),
                text: Some("Second".to_string()),
                content_description: None,
            },
            ElementDescriptor {
                reference: "ref-0".to_string(),
                element_class: "android.widget.Button".to_string(),
                text: Some("First".to_string()),
                content_description: None,
            },
        ];
        let mut session = scripted_session(vec![Response::Elements {
            elements: elements.clone(),
        }]);

        let result = session.query("button").await.unwrap();
        assert_eq!(result, elements);
    }

    #[tokio::test]
    async fn screenshot_decodes_base64() {
        use base64::Engine;
        let png = vec![0x89u8, b'P', b'N', b'G'];
        let data = base64::engine::general_purpose::STANDARD.encode(&png);
        let mut session = scripted_session(vec![Response::Screenshot { data }]);

        let bytes = session.screenshot().await.unwrap();
        assert_eq!(bytes, png);
    }

    #[tokio::test]
    async fn screenshot_rejects_invalid_base64() {
        let mut session = scripted_session(vec![Response::Screenshot {
            data: "!!! not base64 !!!".to_string(),
        }]);

        let err = session.screenshot().await.unwrap_err();
        assert!(matches!(err, BridgeError::Screenshot(_)));
    }

    #[tokio::test]
    async fn read_preferences_returns_map() {
        let mut values = HashMap::new();
        values.insert("logged_in".to_string(), "true".to_string());
        values.insert("user".to_string(), "ada".to_string());
        let mut session = scripted_session(vec![Response::Preferences {
            values: values.clone(),
        }]);

        let prefs = session.read_preferences("app_prefs").await.unwrap();
        assert_eq!(prefs, values);
    }

    #[tokio::test]
    async fn unexpected_response_shape_is_an_error() {
        // Ping answered with a tree is a desynchronized helper.
        let mut session = scripted_session(vec![Response::Tree { root: None }]);

        let err = session.ping().await.unwrap_err();
        assert!(matches!(err, BridgeError::UnexpectedResponse("ping")));
    }

    #[tokio::test]
    async fn helper_drop_closes_the_session() {
        // One scripted response; the second request hits a dropped stream.
        let mut session = scripted_session(vec![Response::Ok]);
        session.ping().await.unwrap();

        let err = session.ping().await.unwrap_err();
        assert!(matches!(err, BridgeError::Io(_)));
        assert!(!session.is_open());

        // Every later request fails fast.
        let err = session.ping().await.unwrap_err();
        assert!(matches!(err, BridgeError::NotOpen));
    }

    #[tokio::test]
    async fn garbage_payload_closes_the_session() {
        let (client, mut server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let mut header = [0u8; 4];
            server.read_exact(&mut header).await.unwrap();
            let len = read_frame_length(&header) as usize;
            let mut payload = vec![0u8; len];
            server.read_exact(&mut payload).await.unwrap();

            // A well-formed frame whose payload is not JSON.
            let junk = crate::protocol::encode_frame(b"\x00\x01\x02 junk");
            server.write_all(&junk).await.unwrap();
        });

        let mut session = BridgeSession::from_stream(client);
        let err = session.ping().await.unwrap_err();
        assert!(matches!(err, BridgeError::Protocol(_)));
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn oversize_frame_is_rejected() {
        let (client, mut server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let mut header = [0u8; 4];
            server.read_exact(&mut header).await.unwrap();
            let len = read_frame_length(&header) as usize;
            let mut payload = vec![0u8; len];
            server.read_exact(&mut payload).await.unwrap();

            // Header announcing an absurd payload.
            let header = (MAX_FRAME_LEN + 1).to_le_bytes();
            server.write_all(&header).await.unwrap();
        });

        let mut session = BridgeSession::from_stream(client);
        let err = session.ping().await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Protocol(ProtocolError::Oversize(_))
        ));
        assert!(!session.is_open());
    }
}
