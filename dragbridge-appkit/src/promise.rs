use std::path::PathBuf;
use std::ptr;
use std::sync::Arc;

use block2::{DynBlock, RcBlock};
use dragbridge_core::error::WriteError;
use dragbridge_core::task::{DeliveryTask, WriteCompletion, WriteRequest};
use objc2::rc::Retained;
use objc2::runtime::{AnyObject, NSObject, ProtocolObject};
use objc2::{define_class, msg_send, AllocAnyThread, DefinedClass, Message};
use objc2_app_kit::{NSFilePromiseProvider, NSFilePromiseProviderDelegate};
use objc2_foundation::{
    NSError, NSObjectProtocol, NSOperationQueue, NSPOSIXErrorDomain, NSString, NSURL,
};
use tracing::{debug, warn};

use crate::progress::FileProgressPublisher;

const ERROR_DOMAIN: &str = "dragbridge";

#[derive(Debug)]
pub struct PromiseState {
    task: Arc<DeliveryTask>,
    queue: Retained<NSOperationQueue>,
}

define_class!(
    #[unsafe(super(NSObject))]
    #[name = "DragBridgeFilePromiseDelegate"]
    #[ivars = PromiseState]
    pub struct FilePromiseDelegate;

    unsafe impl NSObjectProtocol for FilePromiseDelegate {}

    unsafe impl NSFilePromiseProviderDelegate for FilePromiseDelegate {
        #[unsafe(method(filePromiseProvider:fileNameForType:))]
        fn file_name_for_type(
            &self,
            _provider: &NSFilePromiseProvider,
            _file_type: &NSString,
        ) -> Retained<NSString> {
            NSString::from_str(self.ivars().task.file_name())
        }

        #[unsafe(method(filePromiseProvider:writePromiseToURL:completionHandler:))]
        fn write_promise_to_url(
            &self,
            _provider: &NSFilePromiseProvider,
            url: &NSURL,
            completion_handler: &DynBlock<dyn Fn(*mut NSError)>,
        ) {
            let task = &self.ivars().task;
            let completion = CompletionHandler(completion_handler.copy());
            let Some(path) = url.path() else {
                warn!(file_name = task.file_name(), "file promise destination is not a file URL");
                completion.complete(Err(WriteError::Abandoned));
                return;
            };
            let url_string = url.absoluteString().map(|url| url.to_string()).unwrap_or_default();
            debug!(file_name = task.file_name(), url = %url_string, "OS requested file promise");

            let request = WriteRequest::new(
                PathBuf::from(path.to_string()),
                url_string,
                WriteCompletion::new(move |result| completion.complete(result)),
            )
            .with_progress(Box::new(FileProgressPublisher::new(url)));

            // Failures were already reported through the completion handler.
            let _ = task.begin_write(request);
        }

        #[unsafe(method(operationQueueForFilePromiseProvider:))]
        fn operation_queue(&self, _provider: &NSFilePromiseProvider) -> Retained<NSOperationQueue> {
            self.ivars().queue.clone()
        }
    }
);

impl FilePromiseDelegate {
    pub fn new(task: Arc<DeliveryTask>) -> Retained<Self> {
        let queue = NSOperationQueue::new();
        queue.setMaxConcurrentOperationCount(1);
        let this = Self::alloc().set_ivars(PromiseState { task, queue });
        unsafe { msg_send![super(this), init] }
    }

    pub fn task(&self) -> &Arc<DeliveryTask> {
        &self.ivars().task
    }

    /// Create a provider for `task` advertising `file_type`.
    ///
    /// Providers only reference their delegate weakly; the delegate is kept alive as the
    /// provider's user info.
    pub fn provider(task: Arc<DeliveryTask>, file_type: &str) -> Retained<NSFilePromiseProvider> {
        let delegate = Self::new(task);
        let provider = NSFilePromiseProvider::initWithFileType_delegate(
            NSFilePromiseProvider::alloc(),
            &NSString::from_str(file_type),
            ProtocolObject::from_ref(&*delegate),
        );
        let user_info: &AnyObject = &delegate;
        // SAFETY: Any object may be stored as user info.
        unsafe { provider.setUserInfo(Some(user_info)) };
        provider
    }
}

/// The OS completion handler of one write.
struct CompletionHandler(RcBlock<dyn Fn(*mut NSError)>);

// SAFETY: AppKit accepts completion of file promises from any thread.
unsafe impl Send for CompletionHandler {}

impl CompletionHandler {
    fn complete(self, result: Result<(), WriteError>) {
        match result {
            Ok(()) => self.0.call((ptr::null_mut(),)),
            Err(error) => {
                let error = ns_error(&error);
                self.0.call((Retained::as_ptr(&error) as *mut NSError,));
            },
        }
    }
}

fn ns_error(error: &WriteError) -> Retained<NSError> {
    let (domain, code) = match error {
        WriteError::Io(io) => match io.raw_os_error() {
            // SAFETY: The domain constant is valid for the lifetime of the program.
            Some(errno) => (unsafe { NSPOSIXErrorDomain }.retain(), errno as isize),
            None => (NSString::from_str(ERROR_DOMAIN), 1),
        },
        WriteError::MissingChunk => (NSString::from_str(ERROR_DOMAIN), 2),
        WriteError::AlreadyStarted => (NSString::from_str(ERROR_DOMAIN), 3),
        WriteError::TimedOut => (NSString::from_str(ERROR_DOMAIN), 4),
        _ => (NSString::from_str(ERROR_DOMAIN), 5),
    };
    // SAFETY: No user info is attached.
    unsafe { NSError::errorWithDomain_code_userInfo(&domain, code, None) }
}
