//! gRPC 契约
//!
//! 由 tonic-build 从 proto/ 目录下的定义生成。
//! 各服务引用这里的类型实现服务端，gateway 引用客户端桩。

pub mod identity {
    tonic::include_proto!("identity");
}

pub mod catalog {
    tonic::include_proto!("catalog");
}

pub mod order {
    tonic::include_proto!("order");
}
