//! Win32 GDI implementation of [`SurfaceApi`]

use crate::surface::{SurfaceApi, SurfaceSource};
use crate::{CaptureError, CaptureResult, Rect, WindowHandle};
use std::ffi::c_void;
use std::mem::size_of;
use windows::Win32::Foundation::{HWND, RECT};
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC,
    GetDIBits, GetWindowDC, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB,
    CAPTUREBLT, DIB_RGB_COLORS, HBITMAP, HDC, HGDIOBJ, ROP_CODE, SRCCOPY,
};
use windows::Win32::UI::WindowsAndMessaging::{GetWindowRect, IsWindow};

fn hwnd(handle: WindowHandle) -> HWND {
    HWND(handle.0 as *mut c_void)
}

fn failure(call: &str) -> CaptureError {
    CaptureError::CaptureFailure(format!("{call} failed"))
}

/// GDI surfaces on the calling thread's desktop
#[derive(Debug, Default, Clone, Copy)]
pub struct GdiSurfaceApi;

impl SurfaceApi for GdiSurfaceApi {
    type Dc = HDC;
    type Bitmap = HBITMAP;
    type Object = HGDIOBJ;

    fn window_rect(&self, window: WindowHandle) -> CaptureResult<Rect> {
        let hwnd = hwnd(window);
        unsafe {
            if !IsWindow(hwnd).as_bool() {
                return Err(CaptureError::InvalidTarget);
            }
            let mut rect = RECT::default();
            GetWindowRect(hwnd, &mut rect)
                .map_err(|e| CaptureError::CaptureFailure(format!("GetWindowRect: {e}")))?;
            Ok(Rect::from_ltrb(rect.left, rect.top, rect.right, rect.bottom))
        }
    }

    fn source_dc(&self, source: SurfaceSource) -> CaptureResult<HDC> {
        let dc = unsafe {
            match source {
                SurfaceSource::Screen => GetDC(None),
                SurfaceSource::Window(window) => GetWindowDC(hwnd(window)),
            }
        };
        if dc.is_invalid() {
            return Err(failure("GetDC"));
        }
        Ok(dc)
    }

    fn release_source_dc(&self, source: SurfaceSource, dc: HDC) {
        unsafe {
            match source {
                SurfaceSource::Screen => ReleaseDC(None, dc),
                SurfaceSource::Window(window) => ReleaseDC(hwnd(window), dc),
            };
        }
    }

    fn create_memory_dc(&self, compatible_with: HDC) -> CaptureResult<HDC> {
        let dc = unsafe { CreateCompatibleDC(compatible_with) };
        if dc.is_invalid() {
            return Err(failure("CreateCompatibleDC"));
        }
        Ok(dc)
    }

    fn delete_memory_dc(&self, dc: HDC) {
        unsafe {
            let _ = DeleteDC(dc);
        }
    }

    fn create_bitmap(&self, compatible_with: HDC, width: i32, height: i32) -> CaptureResult<HBITMAP> {
        let bitmap = unsafe { CreateCompatibleBitmap(compatible_with, width, height) };
        if bitmap.is_invalid() {
            return Err(failure("CreateCompatibleBitmap"));
        }
        Ok(bitmap)
    }

    fn delete_bitmap(&self, bitmap: HBITMAP) {
        unsafe {
            let _ = DeleteObject(bitmap);
        }
    }

    fn select_bitmap(&self, dc: HDC, bitmap: HBITMAP) -> CaptureResult<HGDIOBJ> {
        let previous = unsafe { SelectObject(dc, bitmap) };
        // HGDI_ERROR is (HGDIOBJ)-1
        if previous.is_invalid() || previous.0 as isize == -1 {
            return Err(failure("SelectObject"));
        }
        Ok(previous)
    }

    fn restore_object(&self, dc: HDC, previous: HGDIOBJ) {
        unsafe {
            SelectObject(dc, previous);
        }
    }

    fn block_copy(
        &self,
        dst: HDC,
        src: HDC,
        src_x: i32,
        src_y: i32,
        width: i32,
        height: i32,
    ) -> CaptureResult<()> {
        // CAPTUREBLT includes layered windows composited over the region.
        let rop = ROP_CODE(SRCCOPY.0 | CAPTUREBLT.0);
        unsafe { BitBlt(dst, 0, 0, width, height, src, src_x, src_y, rop) }
            .map_err(|e| CaptureError::CaptureFailure(format!("BitBlt: {e}")))
    }

    fn read_pixels(&self, dc: HDC, bitmap: HBITMAP, width: i32, height: i32) -> CaptureResult<Vec<u8>> {
        let mut bmi = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width,
                biHeight: -height, // Top-down DIB
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            bmiColors: [Default::default()],
        };

        let mut data = vec![0u8; width as usize * height as usize * 4];
        let lines = unsafe {
            GetDIBits(
                dc,
                bitmap,
                0,
                height as u32,
                Some(data.as_mut_ptr() as *mut _),
                &mut bmi,
                DIB_RGB_COLORS,
            )
        };
        if lines != height {
            return Err(failure("GetDIBits"));
        }
        Ok(data)
    }
}
