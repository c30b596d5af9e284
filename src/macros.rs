/// Forward to the `log` facade when the `log` feature is enabled; expands to
/// nothing otherwise.
macro_rules! log {
	($fn:ident, $($arg:tt)*) => {
		#[cfg(feature = "log")]
		log::$fn!(target: "frame_codec", $($arg)*);
	}
}

pub(crate) use log;
