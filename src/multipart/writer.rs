use super::{
    super::{PayloadError, PayloadResult},
    encode_headers, Boundary, UploadFile,
};
use log::warn;
use mime::Mime;
use std::{fs::File, io::copy};

/// 将 Multipart 表单写入内存缓冲区
///
/// 结束分隔符由 `finish` 写入，如果写入过程中途退出，结束分隔符将在释放时补上
#[derive(Debug)]
pub(super) struct MultipartWriter<'w> {
    buffer: &'w mut Vec<u8>,
    boundary: &'w Boundary,
    finished: bool,
}

impl<'w> MultipartWriter<'w> {
    pub(super) fn new(buffer: &'w mut Vec<u8>, boundary: &'w Boundary) -> Self {
        Self {
            buffer,
            boundary,
            finished: false,
        }
    }

    pub(super) fn write_file(&mut self, upload: &UploadFile, content_type: &Mime) -> PayloadResult<()> {
        let path = upload.path();
        let mut file = File::open(path).map_err(|err| PayloadError::UploadFileError {
            path: path.to_owned(),
            source: err,
        })?;
        let file_name = upload.file_name();
        self.begin_part(upload.field_name(), Some(&*file_name), Some(content_type));
        copy(&mut file, &mut *self.buffer).map_err(|err| PayloadError::UploadFileError {
            path: path.to_owned(),
            source: err,
        })?;
        self.end_part();
        Ok(())
    }

    pub(super) fn write_field(&mut self, name: &str, value: &str) {
        self.begin_part(name, None, None);
        self.buffer.extend_from_slice(value.as_bytes());
        self.end_part();
    }

    pub(super) fn finish(mut self) {
        self.write_ending();
    }

    fn begin_part(&mut self, name: &str, file_name: Option<&str>, content_type: Option<&Mime>) {
        self.buffer.extend_from_slice(b"--");
        self.buffer.extend_from_slice(self.boundary.as_bytes());
        self.buffer.extend_from_slice(b"\r\n");
        self.buffer.extend_from_slice(&encode_headers(name, file_name, content_type));
        self.buffer.extend_from_slice(b"\r\n\r\n");
    }

    fn end_part(&mut self) {
        self.buffer.extend_from_slice(b"\r\n");
    }

    fn write_ending(&mut self) {
        self.buffer.extend_from_slice(b"--");
        self.buffer.extend_from_slice(self.boundary.as_bytes());
        self.buffer.extend_from_slice(b"--\r\n");
        self.finished = true;
    }
}

impl Drop for MultipartWriter<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("MultipartWriter is dropped before finished, write the closing boundary now");
            self.write_ending();
        }
    }
}
