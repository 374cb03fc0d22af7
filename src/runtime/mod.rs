//! 外部协作者：容器运行时、HTTP 客户端、加速器查询

pub mod container;
pub mod hardware;
pub mod http;

pub use container::{ContainerRuntime, DockerCli};
pub use hardware::{AcceleratorQuery, NvidiaSmi};
pub use http::{HttpClient, ReqwestClient};
