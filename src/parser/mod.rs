pub mod cms_parser;
pub mod csq_parser;
pub mod primitive_parser;
pub mod timing;
