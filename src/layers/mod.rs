pub mod conv2d;
pub mod dense;
pub mod dropout;
pub mod log_softmax;
pub mod maxpool;

pub use conv2d::Conv2d;
pub use dense::Dense;
pub use dropout::Dropout;
pub use log_softmax::LogSoftmax;
pub use maxpool::MaxPool2;
