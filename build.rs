fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // 编译时记录构建时间，显示在 --version 中
    let build_time = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    println!("cargo:rustc-env=BUILD_TIME={}", build_time);
}
