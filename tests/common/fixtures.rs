//! Test fixture creation

use product_relay::listing::Product;
use std::path::{Path, PathBuf};

/// Builds a product with the given images.
pub fn product(id: u32, title: &str, image_urls: Vec<String>) -> Product {
    let mut product = Product::new(format!("https://shop.example.com/p/{}", id), title);
    product.description = format!("{} made of stoneware, dishwasher safe.", title);
    product.image_urls = image_urls;
    product
}

/// Writes `products` as a product file inside `dir` and returns its path.
pub fn write_products(dir: &Path, products: &[Product]) -> PathBuf {
    let path = dir.join("products.json");
    std::fs::write(
        &path,
        serde_json::to_string_pretty(products).expect("Failed to serialize products"),
    )
    .expect("Failed to write products file");
    path
}

/// Number of regular files in `dir`, ignoring temp files.
pub fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.path().is_file())
                .count()
        })
        .unwrap_or(0)
}
