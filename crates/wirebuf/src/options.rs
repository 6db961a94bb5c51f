/// Output options for [`OutStream::write_obj`](crate::OutStream::write_obj).
///
/// # Examples
///
/// ```rust
/// use wirebuf::ObjOptions;
///
/// let options = ObjOptions {
///     indent: Some(2),
/// };
/// assert_eq!(ObjOptions::default().indent, None);
/// # let _ = options;
/// ```
///
/// # Default
///
/// Compact output on a single line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjOptions {
    /// Pretty-print with this many spaces per nesting level.
    ///
    /// When `None`, the object is written without any whitespace between
    /// tokens.
    ///
    /// # Default
    ///
    /// `None`
    pub indent: Option<usize>,
}
