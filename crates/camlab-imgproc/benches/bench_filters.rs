use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use camlab_image::Image;
use camlab_imgproc::{
    filter::{box_blur_u8, gaussian_blur, gaussian_blur_u8, median_blur},
    photo::edge_preserving,
};

fn bench_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("Blur");

    for (width, height) in [(320, 240), (640, 480)].iter() {
        for kernel_size in [3, 5, 9].iter() {
            group.throughput(criterion::Throughput::Elements(
                (*width * *height * *kernel_size) as u64,
            ));

            let parameter_string = format!("{}x{}x{}", width, height, kernel_size);

            let image_size = [*width, *height].into();
            let image_data = (0..width * height * 3).map(|i| (i % 251) as u8).collect();
            let image_u8 = Image::<u8, 3>::new(image_size, image_data).unwrap();
            let image_f32 = image_u8.cast::<f32>().unwrap();
            let output_f32 = Image::<f32, 3>::from_size_val(image_size, 0.0).unwrap();

            group.bench_with_input(
                BenchmarkId::new("gaussian_blur_f32", &parameter_string),
                &(&image_f32, &output_f32),
                |b, i| {
                    let (src, mut dst) = (i.0, i.1.clone());
                    b.iter(|| {
                        black_box(gaussian_blur(
                            src,
                            &mut dst,
                            (*kernel_size, *kernel_size),
                            (1.5, 1.5),
                        ))
                    })
                },
            );

            group.bench_with_input(
                BenchmarkId::new("gaussian_blur_u8", &parameter_string),
                &image_u8,
                |b, i| b.iter(|| black_box(gaussian_blur_u8(i, *kernel_size, 1.5))),
            );

            group.bench_with_input(
                BenchmarkId::new("box_blur_u8", &parameter_string),
                &image_u8,
                |b, i| b.iter(|| black_box(box_blur_u8(i, *kernel_size))),
            );

            group.bench_with_input(
                BenchmarkId::new("median_blur", &parameter_string),
                &image_u8,
                |b, i| b.iter(|| black_box(median_blur(i, *kernel_size))),
            );
        }

        let image_size = [*width, *height].into();
        let image_data = (0..width * height * 3).map(|i| (i % 199) as u8).collect();
        let image_u8 = Image::<u8, 3>::new(image_size, image_data).unwrap();

        group.bench_with_input(
            BenchmarkId::new("edge_preserving", format!("{}x{}", width, height)),
            &image_u8,
            |b, i| b.iter(|| black_box(edge_preserving(i, 50.0, 0.15))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_filters);
criterion_main!(benches);
